//! Action registration: typed handlers plus their metadata side-table.

use crate::{
    error::{DefinitionError, Error},
    param::{ActionParam, Arguments, ParamKind},
    script::Script,
};
use std::{fmt, sync::Arc};

/// Name under which the `created` lifecycle handler is dispatched.
pub const CREATED_ACTION: &str = "OnCreated";

/// Suffix marking an action as watcher of the field named by its prefix.
pub const WATCH_SUFFIX: &str = "_watch";

/// Return value of an action handler.
pub trait ActionOutcome {
    fn into_result(self) -> anyhow::Result<()>;
}

impl ActionOutcome for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> ActionOutcome for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// A function usable as action of view model `VM`.
///
/// Implemented for `Fn(&mut VM, &mut Script, A1, .., An)` with every `Ai`
/// an [`ActionParam`]. All parameters are coerced before the function runs,
/// so a coercion failure never reaches the handler.
pub trait ActionHandler<VM, Args>: Send + Sync + 'static {
    fn parameters() -> Vec<ParamKind>;

    fn invoke(&self, vm: &mut VM, js: &mut Script, args: &mut Arguments) -> Result<(), Error>;
}

macro_rules! impl_action_handler {
    ($($ty:ident),*) => {
        impl<VM, F, R, $($ty,)*> ActionHandler<VM, ($($ty,)*)> for F
        where
            F: Fn(&mut VM, &mut Script, $($ty),*) -> R + Send + Sync + 'static,
            R: ActionOutcome,
            $($ty: ActionParam,)*
        {
            fn parameters() -> Vec<ParamKind> {
                vec![$(<$ty as ActionParam>::KIND),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn invoke(
                &self,
                vm: &mut VM,
                js: &mut Script,
                args: &mut Arguments,
            ) -> Result<(), Error> {
                $(let $ty = <$ty as ActionParam>::extract(args)?;)*
                (self)(vm, js, $($ty),*)
                    .into_result()
                    .map_err(Error::ActionFailed)
            }
        }
    };
}

impl_action_handler!();
impl_action_handler!(A1);
impl_action_handler!(A1, A2);
impl_action_handler!(A1, A2, A3);
impl_action_handler!(A1, A2, A3, A4);
impl_action_handler!(A1, A2, A3, A4, A5);
impl_action_handler!(A1, A2, A3, A4, A5, A6);

type Invoker<VM> =
    Arc<dyn Fn(&mut VM, &mut Script, &mut Arguments) -> Result<(), Error> + Send + Sync>;

/// Declared parameter of an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// A client callable method of a view model together with its metadata.
pub struct Action<VM> {
    name: String,
    kinds: Vec<ParamKind>,
    names: Option<Vec<String>>,
    roles: Vec<String>,
    pre_scripts: Vec<String>,
    post_scripts: Vec<String>,
    watch: Option<String>,
    invoker: Invoker<VM>,
}

impl<VM: 'static> Action<VM> {
    pub fn new<H, T>(name: impl Into<String>, handler: H) -> Self
    where
        H: ActionHandler<VM, T>,
        T: 'static,
    {
        let invoker: Invoker<VM> = Arc::new(
            move |vm: &mut VM, js: &mut Script, args: &mut Arguments| handler.invoke(vm, js, args),
        );

        Self {
            name: name.into(),
            kinds: H::parameters(),
            names: None,
            roles: Vec::new(),
            pre_scripts: Vec::new(),
            post_scripts: Vec::new(),
            watch: None,
            invoker,
        }
    }

    /// Name the handler's parameters, in declaration order.
    ///
    /// The names become the parameters of the generated client method.
    /// Unnamed parameters are called `p0`, `p1`, ...
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Require the caller to hold at least one of `roles`.
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Client code run before the update call is sent.
    pub fn pre_script(mut self, code: impl Into<String>) -> Self {
        self.pre_scripts.push(code.into());
        self
    }

    /// Client code run with the component as `this` after the update applied.
    pub fn post_script(mut self, code: impl Into<String>) -> Self {
        self.post_scripts.push(code.into());
        self
    }

    /// Call this action whenever `field` changes on the client.
    pub fn watch(mut self, field: impl Into<String>) -> Self {
        self.watch = Some(field.into());
        self
    }
}

impl<VM> Action<VM> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles_required(&self) -> &[String] {
        &self.roles
    }

    /// Parameters in declaration order, attachments included.
    pub fn parameters(&self) -> Vec<Param> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| Param {
                name: self
                    .names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| format!("p{i}")),
                kind: *kind,
            })
            .collect()
    }

    pub fn pre_scripts(&self) -> &[String] {
        &self.pre_scripts
    }

    pub fn post_scripts(&self) -> &[String] {
        &self.post_scripts
    }

    /// Field watched by this action, from explicit metadata or the name suffix.
    pub fn watched_field(&self) -> Option<&str> {
        if let Some(field) = &self.watch {
            return Some(field.as_str());
        }

        let split = self.name.len().checked_sub(WATCH_SUFFIX.len())?;
        let (field, suffix) = (self.name.get(..split)?, self.name.get(split..)?);

        suffix.eq_ignore_ascii_case(WATCH_SUFFIX).then_some(field)
    }

    pub(crate) fn check(&self) -> Result<(), DefinitionError> {
        if self.name.is_empty() {
            return Err(DefinitionError::EmptyActionName);
        }

        let attachments = self.kinds.iter().filter(|k| k.is_attachment()).count();
        if attachments > 1 {
            return Err(DefinitionError::MultipleAttachments {
                name: self.name.clone(),
                count: attachments,
            });
        }

        if let Some(names) = &self.names {
            if names.len() != self.kinds.len() {
                return Err(DefinitionError::ParameterCount {
                    name: self.name.clone(),
                    declared: names.len(),
                    expected: self.kinds.len(),
                });
            }
        }

        if self.watched_field().is_some_and(str::is_empty) {
            return Err(DefinitionError::EmptyWatchField {
                action: self.name.clone(),
            });
        }

        Ok(())
    }

    pub(crate) fn invoke(
        &self,
        vm: &mut VM,
        js: &mut Script,
        args: &mut Arguments,
    ) -> Result<(), Error> {
        (self.invoker)(vm, js, args)
    }
}

impl<VM> fmt::Debug for Action<VM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("parameters", &self.kinds)
            .field("roles", &self.roles)
            .field("watch", &self.watched_field())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Attachment, Token};

    #[derive(Default)]
    struct Vm {
        total: i64,
        label: String,
        uploaded: usize,
    }

    fn add(vm: &mut Vm, _: &mut Script, amount: i64) {
        vm.total += amount;
    }

    fn rename(vm: &mut Vm, js: &mut Script, label: String, file: Option<Attachment>) {
        vm.label = label;
        vm.uploaded = file.map_or(0, |f| f.len());
        js.alert("renamed");
    }

    fn fail(_: &mut Vm, _: &mut Script) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }

    #[test]
    fn handler_arity_and_kinds_are_derived_from_signature() {
        let action = Action::new("rename", rename).params(["label", "file"]);
        let params = action.parameters();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "label");
        assert_eq!(params[0].kind, ParamKind::Token);
        assert_eq!(params[1].name, "file");
        assert_eq!(params[1].kind, ParamKind::Attachment);
        assert!(action.check().is_ok());
    }

    #[test]
    fn unnamed_parameters_get_positional_names() {
        let action = Action::new("add", add);

        assert_eq!(action.parameters()[0].name, "p0");
    }

    #[test]
    fn invoke_binds_tokens_and_attachments() {
        let action = Action::new("rename", rename);
        let mut vm = Vm::default();
        let mut js = Script::new();
        let mut args = Arguments::new(
            vec![Token::Text("Bob".into())],
            vec![Attachment::new("a.png", vec![1, 2, 3])],
        );

        action.invoke(&mut vm, &mut js, &mut args).unwrap();

        assert_eq!(vm.label, "Bob");
        assert_eq!(vm.uploaded, 3);
        assert_eq!(js.as_str(), "alert('renamed');");
    }

    #[test]
    fn coercion_failure_skips_the_handler() {
        let action = Action::new("add", add);
        let mut vm = Vm::default();
        let mut args = Arguments::new(vec![Token::Text("many".into())], vec![]);

        let result = action.invoke(&mut vm, &mut Script::new(), &mut args);

        assert!(matches!(result, Err(Error::Coercion(_))));
        assert_eq!(vm.total, 0);
    }

    #[test]
    fn handler_errors_are_reported_as_action_failures() {
        let action = Action::new("fail", fail);
        let result = action.invoke(
            &mut Vm::default(),
            &mut Script::new(),
            &mut Arguments::new(vec![], vec![]),
        );

        assert!(matches!(result, Err(Error::ActionFailed(e)) if e.to_string() == "boom"));
    }

    #[test]
    fn watched_field_comes_from_suffix_or_metadata() {
        assert_eq!(Action::new("total_Watch", add).watched_field(), Some("total"));
        assert_eq!(Action::new("label_watch", add).watched_field(), Some("label"));
        assert_eq!(
            Action::new("onTotal", add).watch("total").watched_field(),
            Some("total")
        );
        assert_eq!(Action::new("add", add).watched_field(), None);
    }

    #[test]
    fn invalid_metadata_is_a_definition_error() {
        assert_eq!(
            Action::new("add", add).params(["a", "b"]).check(),
            Err(DefinitionError::ParameterCount {
                name: "add".to_string(),
                declared: 2,
                expected: 1
            })
        );
        assert_eq!(
            Action::new("_Watch", add).check(),
            Err(DefinitionError::EmptyWatchField {
                action: "_Watch".to_string()
            })
        );

        fn two_files(_: &mut Vm, _: &mut Script, _: Option<Attachment>, _: Vec<Attachment>) {}
        assert!(matches!(
            Action::new("two_files", two_files).check(),
            Err(DefinitionError::MultipleAttachments { count: 2, .. })
        ));
    }
}
