use crate::{
    action::Action,
    descriptor::Markup,
    schema::{Schema, SchemaBuilder, ViewModel},
    script::Script,
};
use serde::{Deserialize, Serialize};

const TEMPLATE: &str = r#"<div class="counter">
  <h1>{{ name }}: {{ count }} (x2 = {{ doubled }})</h1>
  <input id="amount" type="number" v-model.number="step">
  <button @click="increment()">+{{ step }}</button>
  <button @click="add(10)">+10</button>
  <button @click="reset()">reset</button>
  <input v-model="name" @change="rename(name)">
  <ol><li v-for="value in history">{{ value }}</li></ol>
</div>"#;

const STYLE: &str = r#"
.counter h1 {
  font-size: 2em; /* prominent */
}
.counter ol {
  color: #666;
}
"#;

#[derive(Debug, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
    pub step: i64,
    pub name: Option<String>,
    pub history: Vec<i64>,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            count: 0,
            step: 1,
            name: None,
            history: Vec::new(),
        }
    }
}

impl Counter {
    fn increment(&mut self, js: &mut Script) {
        self.add(js, self.step);
    }

    fn add(&mut self, _: &mut Script, amount: i64) {
        self.count = self.count.saturating_add(amount);
        self.history.push(self.count);
    }

    fn rename(&mut self, js: &mut Script, name: Option<String>) {
        match name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => self.name = Some(name),
            _ => {
                self.name = None;
                js.alert("Please enter a name").focus("name");
            }
        }
    }

    fn reset(&mut self, js: &mut Script) {
        self.count = 0;
        self.history.clear();
        js.alert("Counter reset");
    }

    fn step_watch(&mut self, js: &mut Script, value: Option<i64>, _previous: Option<i64>) {
        if value.is_none_or(|step| step < 1) {
            self.step = 1;
            js.console_log("step must be positive");
        }
    }

    fn created(&mut self, js: &mut Script) {
        self.name = Some("Counter".to_string());
        js.focus("amount");
    }
}

impl ViewModel for Counter {
    fn schema() -> SchemaBuilder<Self> {
        Schema::builder()
            .action(Action::new("increment", Self::increment))
            .action(Action::new("add", Self::add).params(["amount"]))
            .action(Action::new("rename", Self::rename).params(["name"]))
            .action(
                Action::new("reset", Self::reset)
                    .roles(["Admin"])
                    .pre_script("if (!confirm('Reset the counter?')) return;"),
            )
            .action(Action::new("step_Watch", Self::step_watch).params(["value", "previous"]))
            .computed("doubled", "function(vm) { return vm.count * 2; }")
            .created(Self::created)
    }
}

pub fn markup() -> Markup {
    Markup::new(TEMPLATE).with_style(STYLE)
}
