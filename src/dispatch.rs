//! Action dispatch with role based authorization.

use crate::{
    action::Action,
    error::{AuthorizationError, DefinitionError, Error},
    param::{Arguments, Attachment, Token},
    schema::{Schema, ViewModel},
    script::Script,
};
use log::debug;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Caller identity as seen by the dispatcher.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Identity {
    fn name(&self) -> String;
    fn is_in_role(&self, role: &str) -> bool;
}

/// An authenticated caller with a fixed role set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Identity for Principal {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// One client call: action name, argument tokens and uploaded files.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Invocation {
    pub method: String,
    pub arguments: Vec<Token>,
    pub attachments: Vec<Attachment>,
}

impl Invocation {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Token>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Check that `caller` holds at least one of the roles `action` requires.
pub fn authorize<VM>(action: &Action<VM>, caller: Option<&dyn Identity>) -> Result<(), Error> {
    let required = action.roles_required();

    if required.is_empty() {
        return Ok(());
    }

    let Some(caller) = caller else {
        return Err(AuthorizationError::Anonymous {
            action: action.name().to_string(),
        }
        .into());
    };

    if required.iter().any(|role| caller.is_in_role(role)) {
        return Ok(());
    }

    debug!(
        "{} lacks roles [{}] for {}",
        caller.name(),
        required.join(", "),
        action.name()
    );

    Err(AuthorizationError::MissingRole {
        action: action.name().to_string(),
        required: required.to_vec(),
    }
    .into())
}

/// Resolve, authorize and run `invocation` against `vm`.
///
/// Nothing is invoked unless the action exists, the caller is authorized and
/// every parameter could be bound.
pub fn dispatch<VM: ViewModel>(
    vm: &mut VM,
    schema: &Schema<VM>,
    invocation: Invocation,
    caller: Option<&dyn Identity>,
    js: &mut Script,
) -> Result<(), Error> {
    let action = schema
        .action(&invocation.method)
        .ok_or_else(|| DefinitionError::UnknownAction {
            name: invocation.method.clone(),
        })?;

    authorize(action, caller)?;

    let mut args = Arguments::new(invocation.arguments, invocation.attachments);
    action.invoke(vm, js, &mut args)?;

    let surplus = args.surplus_tokens();
    if surplus > 0 {
        debug!("{} ignored {surplus} surplus arguments", action.name());
    }

    Ok(())
}
