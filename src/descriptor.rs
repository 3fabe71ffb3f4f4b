//! Behavior descriptor generation and page/component script rendering.
//!
//! The generated script targets a Vue 2 style runtime which provides
//! `$update(method, args, upload, vm)`, `$updating` and `$addStyle(css)` on
//! every instance.

use crate::{
    action::{Action, CREATED_ACTION},
    error::{DefinitionError, Error},
    param::Arguments,
    schema::{Schema, ViewModel},
    script::{Script, encode},
    snapshot::{self, Mount, Snapshot},
};
use anyhow::{Context, Result, bail, ensure};
use log::{debug, warn};
use std::{fs, path::Path};

/// Client side sources of a page or component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markup {
    pub template: String,
    /// Script body returning a mixin object.
    pub mixin: Option<String>,
    /// Stylesheet source handed to the [`StyleCompiler`].
    pub style: Option<String>,
}

impl Markup {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn with_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.mixin = Some(mixin.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Read `<name>.html` plus optional `<name>.js` and `<name>.css` from `dir`.
    pub fn load(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let template_path = dir.join(format!("{name}.html"));

        let template = fs::read_to_string(&template_path)
            .with_context(|| format!("failed to read template {}", template_path.display()))?;

        Ok(Self {
            template,
            mixin: read_optional(&dir.join(format!("{name}.js")))?,
            style: read_optional(&dir.join(format!("{name}.css")))?,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path
        .try_exists()
        .with_context(|| format!("failed to check {}", path.display()))?
    {
        return Ok(None);
    }

    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Turns stylesheet source into plain CSS.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<String>;
}

/// Strips comments and redundant whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct Minified;

impl StyleCompiler for Minified {
    fn compile(&self, source: &str) -> Result<String> {
        let mut stripped = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(start) = rest.find("/*") {
            stripped.push_str(&rest[..start]);
            stripped.push(' ');

            let Some(end) = rest[start + 2..].find("*/") else {
                bail!(
                    "unterminated comment at offset {}",
                    source.len() - rest.len() + start
                );
            };
            rest = &rest[start + 2 + end + 2..];
        }
        stripped.push_str(rest);

        let mut css = String::with_capacity(stripped.len());
        let mut depth = 0usize;
        let mut pending_space = false;

        for c in stripped.chars() {
            if c.is_whitespace() {
                pending_space = !css.is_empty();
                continue;
            }

            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth
                        .checked_sub(1)
                        .context("unbalanced '}' in stylesheet")?;
                }
                _ => {}
            }

            let tight = matches!(c, '{' | '}' | ';' | ',') || css.ends_with(['{', '}', ';', ',']);
            if pending_space && !tight {
                css.push(' ');
            }
            pending_space = false;
            css.push(c);
        }

        ensure!(depth == 0, "unbalanced '{{' in stylesheet");

        Ok(css)
    }
}

/// Compiled style of a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Style {
    Css(String),
    /// Compilation failed, the message is shown to the user instead.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    /// All parameter names, attachments included.
    pub parameters: Vec<String>,
    /// Names sent as argument tokens.
    pub arguments: Vec<String>,
    /// Name of the attachment parameter.
    pub upload: Option<String>,
    pub pre_scripts: Vec<String>,
    pub post_scripts: Vec<String>,
}

impl MethodDescriptor {
    fn from_action<VM>(action: &Action<VM>) -> Self {
        let params = action.parameters();

        Self {
            name: action.name().to_string(),
            arguments: params
                .iter()
                .filter(|p| !p.kind.is_attachment())
                .map(|p| p.name.clone())
                .collect(),
            upload: params
                .iter()
                .find(|p| p.kind.is_attachment())
                .map(|p| p.name.clone()),
            parameters: params.into_iter().map(|p| p.name).collect(),
            pre_scripts: action.pre_scripts().to_vec(),
            post_scripts: action.post_scripts().to_vec(),
        }
    }

    fn render(&self) -> String {
        let then = if self.post_scripts.is_empty() {
            String::new()
        } else {
            format!(
                ".then(function(vm) {{ (function() {{ {} }}).call(vm); }})",
                self.post_scripts.join("; ")
            )
        };

        format!(
            "    '{name}': function({parameters}) {{\n      {pre}this.$update('{name}', [{arguments}], {upload}, this){then};\n    }}",
            name = encode(&self.name),
            parameters = self.parameters.join(", "),
            pre = pre_lines(&self.pre_scripts, "      "),
            arguments = self.arguments.join(", "),
            upload = self.upload.as_deref().unwrap_or("null"),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputedDescriptor {
    pub name: String,
    pub expression: String,
}

impl ComputedDescriptor {
    fn render(&self) -> String {
        format!(
            "    '{}': function() {{\n      return ({})(this);\n    }}",
            encode(&self.name),
            self.expression
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchDescriptor {
    pub field: String,
    pub action: String,
    pub pre_scripts: Vec<String>,
}

impl WatchDescriptor {
    fn render(&self) -> String {
        format!(
            "    '{}': {{\n      handler: function(v, o) {{\n        if (this.$updating) return false;\n        {}this.$update('{}', [v, o], null, this);\n      }},\n      deep: true\n    }}",
            encode(&self.field),
            pre_lines(&self.pre_scripts, "        "),
            encode(&self.action)
        )
    }
}

fn pre_lines(scripts: &[String], indent: &str) -> String {
    scripts
        .iter()
        .map(|code| format!("{code}\n{indent}"))
        .collect()
}

/// Everything the client runtime needs to build a page or component.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorDescriptor {
    pub template: String,
    pub data: Snapshot,
    pub methods: Vec<MethodDescriptor>,
    pub computed: Vec<ComputedDescriptor>,
    pub watch: Vec<WatchDescriptor>,
    pub style: Option<Style>,
    pub mixin: Option<String>,
}

impl BehaviorDescriptor {
    /// Describe `vm` with the members registered in `schema`.
    ///
    /// A failing style compilation degrades to [`Style::Failed`].
    pub fn generate<VM: ViewModel>(
        vm: &VM,
        schema: &Schema<VM>,
        mount: Mount,
        markup: &Markup,
        styles: &dyn StyleCompiler,
    ) -> Result<Self, DefinitionError> {
        let data = snapshot::serialize(vm, schema, mount)?;

        let methods = schema
            .actions()
            .iter()
            .map(MethodDescriptor::from_action)
            .collect();

        let computed = schema
            .computed()
            .iter()
            .map(|c| ComputedDescriptor {
                name: c.name.clone(),
                expression: c.expression.clone(),
            })
            .collect();

        let watch = schema
            .watchers()
            .iter()
            .map(|w| WatchDescriptor {
                field: w.field.clone(),
                action: w.action.clone(),
                pre_scripts: schema
                    .action(&w.action)
                    .map(|a| a.pre_scripts().to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        let style = markup
            .style
            .as_deref()
            .filter(|source| !source.trim().is_empty())
            .map(|source| match styles.compile(source) {
                Ok(css) => Style::Css(css),
                Err(e) => {
                    warn!("failed to compile style of {}: {e:#}", std::any::type_name::<VM>());
                    Style::Failed(format!("{e:#}"))
                }
            });

        Ok(Self {
            template: markup.template.clone(),
            data,
            methods,
            computed,
            watch,
            style,
            mixin: markup.mixin.clone().filter(|m| !m.trim().is_empty()),
        })
    }

    /// Top level entries of the client definition object.
    pub fn entries(&self) -> Vec<String> {
        let mut entries = vec![
            format!("  template: '{}'", encode(&self.template)),
            format!(
                "  data: function() {{ return {}; }}",
                self.data.to_json().replace("</", "<\\/")
            ),
        ];

        if !self.methods.is_empty() {
            entries.push(table(
                "methods",
                self.methods.iter().map(MethodDescriptor::render),
            ));
        }

        if !self.computed.is_empty() {
            entries.push(table(
                "computed",
                self.computed.iter().map(ComputedDescriptor::render),
            ));
        }

        if !self.watch.is_empty() {
            entries.push(table("watch", self.watch.iter().map(WatchDescriptor::render)));
        }

        match &self.style {
            Some(Style::Css(css)) => entries.push(format!(
                "  beforeCreate: function() {{ this.$addStyle('{}'); }}",
                encode(css)
            )),
            Some(Style::Failed(message)) => entries.push(format!(
                "  beforeCreate: function() {{ alert('{}'); }}",
                encode(message)
            )),
            None => {}
        }

        if let Some(mixin) = &self.mixin {
            entries.push(format!("  mixins: [(function() {{ {mixin} }})() || {{}}]"));
        }

        entries
    }
}

fn table(key: &str, rows: impl Iterator<Item = String>) -> String {
    format!("  {key}: {{\n{}\n  }}", rows.collect::<Vec<_>>().join(",\n"))
}

/// Script creating a root instance mounted on the element `id`.
///
/// The `created` handler runs here on the server; script it emits is run by
/// a `mounted` hook.
pub fn render_page<VM: ViewModel>(
    markup: &Markup,
    styles: &dyn StyleCompiler,
    id: &str,
) -> Result<String, Error> {
    let schema = Schema::<VM>::cached()?;
    let mut vm = VM::default();
    let mut js = Script::new();

    if let Some(created) = schema.created() {
        debug!("running {CREATED_ACTION} of {}", std::any::type_name::<VM>());
        created.invoke(&mut vm, &mut js, &mut Arguments::new(Vec::new(), Vec::new()))?;
    }

    Ok(page_script(&vm, &schema, &mut js, markup, styles, id)?)
}

/// Page script for an existing instance, draining `js` into its `mounted` hook.
pub fn page_script<VM: ViewModel>(
    vm: &VM,
    schema: &Schema<VM>,
    js: &mut Script,
    markup: &Markup,
    styles: &dyn StyleCompiler,
    id: &str,
) -> Result<String, DefinitionError> {
    let descriptor = BehaviorDescriptor::generate(vm, schema, Mount::Page, markup, styles)?;
    let mut entries = Vec::new();

    if !js.is_empty() {
        entries.push(format!("  mounted: function() {{\n    {}\n  }}", js.flush()));
    }
    entries.extend(descriptor.entries());

    Ok(format!(
        "new Vue({{\n{}\n}}).$mount('#{}');",
        entries.join(",\n"),
        encode(id)
    ))
}

/// Script body returning a component definition for the module at `vpath`.
///
/// The `created` handler is not run here. The component calls it through
/// the update protocol once its props are in place.
pub fn render_component<VM: ViewModel>(
    markup: &Markup,
    styles: &dyn StyleCompiler,
    vpath: &str,
) -> Result<String, Error> {
    let schema = Schema::<VM>::cached()?;

    Ok(component_script(
        &VM::default(),
        &schema,
        &mut Script::new(),
        markup,
        styles,
        vpath,
    )?)
}

/// Component script for an existing instance, draining `js` into `created`.
pub fn component_script<VM: ViewModel>(
    vm: &VM,
    schema: &Schema<VM>,
    js: &mut Script,
    markup: &Markup,
    styles: &dyn StyleCompiler,
    vpath: &str,
) -> Result<String, DefinitionError> {
    let descriptor =
        BehaviorDescriptor::generate(vm, schema, Mount::Component, markup, styles)?;

    let props = schema
        .props()
        .iter()
        .map(|p| format!("'{}'", encode(&p.name)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut created = schema
        .props()
        .iter()
        .map(|p| format!("    this.{} = this.{};", p.field, p.name))
        .collect::<Vec<_>>();

    if !js.is_empty() {
        created.push(format!("    {}", js.flush()));
    }

    if schema.created().is_some() {
        created.push(format!("    this.$update('{CREATED_ACTION}', [], null, this);"));
    }

    let mut entries = vec![
        format!("  vpath: '{}'", encode(vpath)),
        format!("  props: [{props}]"),
        format!("  created: function() {{\n{}\n  }}", created.join("\n")),
    ];
    entries.extend(descriptor.entries());

    Ok(format!("return {{\n{}\n}}\n", entries.join(",\n")))
}
