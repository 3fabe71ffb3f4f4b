//! The stateless update cycle: populate, dispatch, diff.

use crate::{
    diff::{ChangeSet, diff},
    dispatch::{Identity, Invocation, dispatch},
    error::Result,
    param::{Attachment, Token},
    schema::{Schema, ViewModel},
    script::Script,
    snapshot::{self, Mount, Snapshot},
};
use log::debug;

/// Client request of one action call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateRequest {
    /// JSON text of the client's current snapshot.
    pub snapshot: String,
    pub method: String,
    pub parameters: Vec<Token>,
    pub files: Vec<Attachment>,
}

/// Rebuild a `VM` from the request, run the action and report what changed.
///
/// Changes are computed against the submitted snapshot. A snapshot carrying a
/// prop field comes from a page, otherwise prop fields are left to the
/// parent component. Any failure discards the instance and no change set is
/// produced.
pub fn update_model<VM: ViewModel>(
    request: UpdateRequest,
    caller: Option<&dyn Identity>,
) -> Result<ChangeSet> {
    let schema = Schema::<VM>::cached()?;
    let prior = Snapshot::parse(&request.snapshot)?;

    let mut vm = VM::default();
    let mut js = Script::new();

    snapshot::populate(&mut vm, &prior)?;

    let invocation = Invocation::new(request.method)
        .with_arguments(request.parameters)
        .with_attachments(request.files);

    dispatch(&mut vm, &schema, invocation, caller, &mut js)?;

    let mount = if schema.props().iter().any(|p| prior.contains(&p.field)) {
        Mount::Page
    } else {
        Mount::Component
    };

    let posterior = snapshot::serialize(&vm, &schema, mount)?;
    let changes = diff(&prior, &posterior, &mut js);

    debug!(
        "{} changed [{}]",
        std::any::type_name::<VM>(),
        changes.update.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    Ok(changes)
}
