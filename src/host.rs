//! Registry of the view models served by the HTTP layer.

use crate::{
    descriptor::{self, Markup, Minified, StyleCompiler},
    diff::ChangeSet,
    dispatch::Identity,
    error::{DefinitionError, Result},
    schema::{Schema, ViewModel},
    update::{UpdateRequest, update_model},
};
use log::info;
use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

/// Type erased page or component.
pub trait Page: Send + Sync {
    fn render_page(&self, id: &str) -> Result<String>;

    fn render_component(&self, vpath: &str) -> Result<String>;

    fn update(&self, request: UpdateRequest, caller: Option<&dyn Identity>) -> Result<ChangeSet>;
}

/// A view model type together with its markup.
pub struct PageHost<VM> {
    markup: Markup,
    styles: Arc<dyn StyleCompiler>,
    _vm: PhantomData<fn() -> VM>,
}

impl<VM: ViewModel> PageHost<VM> {
    pub fn new(markup: Markup, styles: Arc<dyn StyleCompiler>) -> Self {
        Self {
            markup,
            styles,
            _vm: PhantomData,
        }
    }
}

impl<VM: ViewModel> Page for PageHost<VM> {
    fn render_page(&self, id: &str) -> Result<String> {
        descriptor::render_page::<VM>(&self.markup, self.styles.as_ref(), id)
    }

    fn render_component(&self, vpath: &str) -> Result<String> {
        descriptor::render_component::<VM>(&self.markup, self.styles.as_ref(), vpath)
    }

    fn update(&self, request: UpdateRequest, caller: Option<&dyn Identity>) -> Result<ChangeSet> {
        update_model::<VM>(request, caller)
    }
}

/// Pages by name.
#[derive(Clone)]
pub struct Pages {
    pages: BTreeMap<String, Arc<dyn Page>>,
    styles: Arc<dyn StyleCompiler>,
}

impl Default for Pages {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
            styles: Arc::new(Minified),
        }
    }
}

impl Pages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `VM` under `name`.
    ///
    /// The schema is built right away so definition errors surface at startup.
    pub fn register<VM: ViewModel>(
        mut self,
        name: impl Into<String>,
        markup: Markup,
    ) -> std::result::Result<Self, DefinitionError> {
        let name = name.into();
        let schema = Schema::<VM>::cached()?;

        info!(
            "registered page '{name}' ({} actions, {} watchers)",
            schema.actions().len(),
            schema.watchers().len()
        );

        self.pages.insert(
            name,
            Arc::new(PageHost::<VM>::new(markup, self.styles.clone())),
        );

        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Page> {
        self.pages.get(name).map(|page| page.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }
}
