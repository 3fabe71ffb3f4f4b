//! Explicit registration of view model members.
//!
//! A view model declares its actions, computed entries, watchers and props
//! through a [`SchemaBuilder`]. Data fields are whatever the type serializes
//! to. The built [`Schema`] is validated once and cached per type.

use crate::{
    action::{Action, ActionOutcome, CREATED_ACTION},
    error::DefinitionError,
    script::Script,
};
use log::debug;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock, RwLock},
};

/// A server side page or component.
///
/// Instances are created fresh (`Default`) for every request and discarded
/// once the response is produced. Serialized fields are the data fields;
/// attachments and other per-request state must be `#[serde(skip)]`.
pub trait ViewModel: Serialize + DeserializeOwned + Default + Send + 'static {
    fn schema() -> SchemaBuilder<Self>;
}

/// Declared input of a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prop {
    /// Internal data field receiving the value.
    pub field: String,
    /// External name used by the parent.
    pub name: String,
}

/// Named expression evaluated by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Computed {
    pub name: String,
    /// Function expression called with the component instance.
    pub expression: String,
}

/// Client side watch calling an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Watcher {
    pub field: String,
    pub action: String,
}

pub struct SchemaBuilder<VM> {
    actions: Vec<Action<VM>>,
    computed: Vec<Computed>,
    props: Vec<Prop>,
    created: Option<Action<VM>>,
}

impl<VM> Default for SchemaBuilder<VM> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            computed: Vec::new(),
            props: Vec::new(),
            created: None,
        }
    }
}

impl<VM: ViewModel> SchemaBuilder<VM> {
    pub fn action(mut self, action: Action<VM>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn computed(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.computed.push(Computed {
            name: name.into(),
            expression: expression.into(),
        });
        self
    }

    /// Bind the external prop `name` to the data field `field`.
    pub fn prop(mut self, field: impl Into<String>, name: impl Into<String>) -> Self {
        self.props.push(Prop {
            field: field.into(),
            name: name.into(),
        });
        self
    }

    /// Lifecycle handler run once when the page or component is created.
    pub fn created<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&mut VM, &mut Script) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.created = Some(Action::new(CREATED_ACTION, handler));
        self
    }

    /// Validate the registration against the data fields of `VM::default()`.
    pub fn build(self) -> Result<Schema<VM>, DefinitionError> {
        let data_fields = data_fields::<VM>()?;

        for prop in &self.props {
            if prop.field == prop.name {
                return Err(DefinitionError::PropNameCollision {
                    field: prop.field.clone(),
                    name: prop.name.clone(),
                });
            }

            if !data_fields.contains(&prop.field) {
                return Err(DefinitionError::UnknownPropField {
                    field: prop.field.clone(),
                    name: prop.name.clone(),
                });
            }
        }

        let mut index = HashMap::new();
        for (i, action) in self.actions.iter().enumerate() {
            action.check()?;

            if action.name() == CREATED_ACTION
                || index.insert(action.name().to_string(), i).is_some()
            {
                return Err(DefinitionError::DuplicateAction {
                    name: action.name().to_string(),
                });
            }
        }

        let mut computed_names = HashSet::new();
        for computed in &self.computed {
            if data_fields.contains(&computed.name) {
                return Err(DefinitionError::ComputedShadowsField {
                    name: computed.name.clone(),
                });
            }

            if !computed_names.insert(computed.name.as_str()) {
                return Err(DefinitionError::DuplicateComputed {
                    name: computed.name.clone(),
                });
            }
        }

        let watchers = self
            .actions
            .iter()
            .filter_map(|action| {
                action.watched_field().map(|field| Watcher {
                    field: field.to_string(),
                    action: action.name().to_string(),
                })
            })
            .collect::<Vec<_>>();

        if let Some(watcher) = watchers.iter().find(|w| !data_fields.contains(&w.field)) {
            return Err(DefinitionError::UnknownWatchField {
                action: watcher.action.clone(),
                field: watcher.field.clone(),
            });
        }

        Ok(Schema {
            actions: self.actions,
            index,
            computed: self.computed,
            props: self.props,
            watchers,
            created: self.created,
            data_fields,
        })
    }
}

/// Validated member table of one view model type.
pub struct Schema<VM> {
    actions: Vec<Action<VM>>,
    index: HashMap<String, usize>,
    computed: Vec<Computed>,
    props: Vec<Prop>,
    watchers: Vec<Watcher>,
    created: Option<Action<VM>>,
    data_fields: Vec<String>,
}

type Cache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

impl<VM: ViewModel> Schema<VM> {
    pub fn builder() -> SchemaBuilder<VM> {
        SchemaBuilder::default()
    }

    /// Schema of `VM`, built on first use and shared afterwards.
    ///
    /// Concurrent first uses may each build a schema; the first one stored
    /// wins and all callers get that instance. Definition errors are not
    /// cached.
    pub fn cached() -> Result<Arc<Self>, DefinitionError> {
        let key = TypeId::of::<VM>();

        let hit = match cache().read() {
            Ok(entries) => entries.get(&key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&key).cloned(),
        };

        if let Some(entry) = hit {
            if let Ok(schema) = entry.downcast::<Self>() {
                return Ok(schema);
            }
        }

        debug!("building schema for {}", std::any::type_name::<VM>());

        let built = Arc::new(VM::schema().build()?);
        let mut entries = match cache().write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries
            .entry(key)
            .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
            .clone();

        Ok(entry.downcast::<Self>().unwrap_or(built))
    }
}

impl<VM> Schema<VM> {
    /// Resolve a dispatchable action, the `created` handler included.
    pub fn action(&self, name: &str) -> Option<&Action<VM>> {
        if name == CREATED_ACTION {
            return self.created.as_ref();
        }

        self.index.get(name).map(|&i| &self.actions[i])
    }

    /// Registered actions in registration order, without the `created` handler.
    pub fn actions(&self) -> &[Action<VM>] {
        &self.actions
    }

    pub fn computed(&self) -> &[Computed] {
        &self.computed
    }

    pub fn props(&self) -> &[Prop] {
        &self.props
    }

    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers
    }

    pub fn created(&self) -> Option<&Action<VM>> {
        self.created.as_ref()
    }

    pub fn data_fields(&self) -> &[String] {
        &self.data_fields
    }

    /// Whether `field` is supplied by a parent component.
    pub fn is_prop_field(&self, field: &str) -> bool {
        self.props.iter().any(|p| p.field == field)
    }
}

fn data_fields<VM: ViewModel>() -> Result<Vec<String>, DefinitionError> {
    match serde_json::to_value(VM::default()) {
        Ok(Value::Object(map)) => Ok(map.keys().cloned().collect()),
        _ => Err(DefinitionError::NotAnObject {
            type_name: std::any::type_name::<VM>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Attachment, Json};
    use serde::Deserialize;

    #[derive(Default, Serialize, Deserialize)]
    struct Basket {
        items: Vec<String>,
        owner: Option<String>,
    }

    impl Basket {
        fn add(&mut self, _: &mut Script, item: String) {
            self.items.push(item);
        }

        fn items_watch(&mut self, _: &mut Script, _: Json<Vec<String>>, _: Json<Vec<String>>) {}

        fn upload(&mut self, _: &mut Script, _: Option<Attachment>) {}
    }

    impl ViewModel for Basket {
        fn schema() -> SchemaBuilder<Self> {
            Schema::builder()
                .action(Action::new("add", Self::add).params(["item"]))
                .action(Action::new("items_Watch", Self::items_watch))
                .action(Action::new("upload", Self::upload))
                .computed("count", "vm => vm.items.length")
                .prop("owner", "ownerName")
        }
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Collision {
        name: String,
    }

    impl ViewModel for Collision {
        fn schema() -> SchemaBuilder<Self> {
            Schema::builder().prop("name", "name")
        }
    }

    #[test]
    fn build_classifies_members() {
        let schema = Basket::schema().build().unwrap();

        assert_eq!(schema.data_fields(), &["items", "owner"]);
        assert_eq!(schema.actions().len(), 3);
        assert_eq!(
            schema.watchers(),
            &[Watcher {
                field: "items".to_string(),
                action: "items_Watch".to_string()
            }]
        );
        assert_eq!(schema.computed()[0].name, "count");
        assert!(schema.is_prop_field("owner"));
        assert!(!schema.is_prop_field("items"));
        assert!(schema.action("add").is_some());
        assert!(schema.action("missing").is_none());
        assert!(schema.action(CREATED_ACTION).is_none());
    }

    #[test]
    fn prop_named_like_its_field_is_rejected() {
        assert_eq!(
            Collision::schema().build().err(),
            Some(DefinitionError::PropNameCollision {
                field: "name".to_string(),
                name: "name".to_string()
            })
        );
        assert!(Schema::<Collision>::cached().is_err());
    }

    #[test]
    fn prop_must_target_a_data_field() {
        let result = Schema::<Basket>::builder().prop("nope", "external").build();

        assert!(matches!(
            result,
            Err(DefinitionError::UnknownPropField { .. })
        ));
    }

    #[test]
    fn duplicate_action_names_are_rejected() {
        let result = Schema::<Basket>::builder()
            .action(Action::new("add", Basket::add))
            .action(Action::new("add", Basket::upload))
            .build();

        assert_eq!(
            result.err(),
            Some(DefinitionError::DuplicateAction {
                name: "add".to_string()
            })
        );

        let reserved = Schema::<Basket>::builder()
            .action(Action::new(CREATED_ACTION, Basket::add))
            .build();
        assert!(reserved.is_err());
    }

    #[test]
    fn watcher_must_target_a_data_field() {
        let result = Schema::<Basket>::builder()
            .action(Action::new("Items_Watch", Basket::items_watch))
            .build();

        assert_eq!(
            result.err(),
            Some(DefinitionError::UnknownWatchField {
                action: "Items_Watch".to_string(),
                field: "Items".to_string()
            })
        );

        let explicit = Schema::<Basket>::builder()
            .action(Action::new("onItems", Basket::items_watch).watch("items"))
            .build();
        assert!(explicit.is_ok());
    }

    #[test]
    fn computed_entries_may_not_shadow_data() {
        let result = Schema::<Basket>::builder()
            .computed("items", "vm => []")
            .build();

        assert!(matches!(
            result,
            Err(DefinitionError::ComputedShadowsField { .. })
        ));
    }

    #[test]
    fn created_handler_is_dispatchable_but_not_listed() {
        let schema = Schema::<Basket>::builder()
            .created(|vm: &mut Basket, _: &mut Script| vm.owner = Some("me".into()))
            .build()
            .unwrap();

        assert!(schema.actions().is_empty());
        assert!(schema.created().is_some());
        assert_eq!(schema.action(CREATED_ACTION).map(Action::name), Some(CREATED_ACTION));
    }

    #[test]
    fn cached_schema_is_shared() {
        let first = Schema::<Basket>::cached().unwrap();
        let second = Schema::<Basket>::cached().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Racer {
        lap: u32,
    }

    impl ViewModel for Racer {
        fn schema() -> SchemaBuilder<Self> {
            Schema::builder().action(Action::new("lap", |vm: &mut Racer, _: &mut Script| {
                vm.lap += 1;
            }))
        }
    }

    #[test]
    fn racing_first_uses_share_one_schema() {
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles = (0..8)
            .map(|_| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    Schema::<Racer>::cached().unwrap()
                })
            })
            .collect::<Vec<_>>();

        let schemas = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        assert!(schemas.iter().all(|s| Arc::ptr_eq(s, &schemas[0])));
        assert!(Arc::ptr_eq(&schemas[0], &Schema::<Racer>::cached().unwrap()));
        assert_eq!(schemas[0].actions().len(), 1);
    }
}
