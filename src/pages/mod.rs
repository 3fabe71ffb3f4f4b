//! View models served by the `vue-page` binary.

pub mod counter;
pub mod profile;

use crate::{descriptor::Markup, error::DefinitionError, host::Pages};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

pub use counter::Counter;
pub use profile::Profile;

/// All demo pages with their built-in markup, schemas validated.
pub fn registry() -> std::result::Result<Pages, DefinitionError> {
    build(counter::markup(), profile::markup())
}

/// All demo pages, taking markup from `dir` where a `<page>.html` exists.
pub fn load(dir: &Path) -> Result<Pages> {
    let pages = build(
        markup_in(dir, "counter", counter::markup)?,
        markup_in(dir, "profile", profile::markup)?,
    )?;

    Ok(pages)
}

fn build(counter: Markup, profile: Markup) -> std::result::Result<Pages, DefinitionError> {
    Pages::new()
        .register::<Counter>("counter", counter)?
        .register::<Profile>("profile", profile)
}

fn markup_in(dir: &Path, name: &str, built_in: fn() -> Markup) -> Result<Markup> {
    let template = dir.join(format!("{name}.html"));

    if template
        .try_exists()
        .with_context(|| format!("failed to check {}", template.display()))?
    {
        info!("loading markup of '{name}' from {}", dir.display());
        Markup::load(dir, name)
    } else {
        Ok(built_in())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn all_pages_register() {
        let pages = registry().unwrap();

        assert_eq!(pages.names().collect::<Vec<_>>(), ["counter", "profile"]);
        assert!(pages.get("counter").is_some());
        assert!(pages.get("missing").is_none());
    }

    #[test]
    fn markup_files_replace_built_in_markup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("counter.html"), "<b>{{ count }}</b>").unwrap();
        fs::write(dir.path().join("counter.css"), "b { color: red; }").unwrap();

        let pages = load(dir.path()).unwrap();

        let counter = pages.get("counter").unwrap().render_page("app").unwrap();
        assert!(counter.contains("template: '\\u003cb\\u003e{{ count }}\\u003c/b\\u003e'"));
        assert!(counter.contains("this.$addStyle('b{color: red;}');"));

        let profile = pages.get("profile").unwrap().render_component("/profile").unwrap();
        assert!(profile.contains("mixins: ["));
    }
}
