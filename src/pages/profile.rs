use crate::{
    action::Action,
    action_enum,
    descriptor::Markup,
    param::{Attachment, Json},
    schema::{Schema, SchemaBuilder, ViewModel},
    script::Script,
};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

const TEMPLATE: &str = r#"<form class="profile" :class="theme">
  <label>Name <input v-model="display_name"></label>
  <input type="file" ref="avatar">
  <button @click.prevent="rename(display_name, $refs.avatar.files[0])">save</button>
  <select @change="set_theme($event.target.value)">
    <option>Light</option><option>Dark</option>
  </select>
  <input type="file" multiple ref="documents" @change="attach_all($refs.documents.files)">
  <ul><li v-for="doc in documents">{{ doc }}</li></ul>
  <span v-if="admin">administrator</span>
</form>"#;

const MIXIN: &str = "return { methods: { isDark: function() { return this.theme === 'Dark'; } } };";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

action_enum!(Theme { Light, Dark });

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub newsletter: bool,
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Profile editor embedded by other pages, the parent passes the user name.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Profile {
    pub user: String,
    pub display_name: String,
    pub theme: Theme,
    pub avatar: Option<Avatar>,
    pub settings: Settings,
    pub documents: Vec<String>,
    pub admin: bool,
}

impl Profile {
    fn rename(
        &mut self,
        js: &mut Script,
        new_name: String,
        upload: Option<Attachment>,
    ) -> anyhow::Result<()> {
        let new_name = new_name.trim();
        ensure!(!new_name.is_empty(), "display name must not be empty");

        self.display_name = new_name.to_string();

        if let Some(file) = upload {
            self.avatar = Some(Avatar {
                size: file.len(),
                file_name: file.file_name,
                content_type: file.content_type,
            });
        }

        js.console_log(&format!("profile of {} renamed", self.user));
        Ok(())
    }

    fn set_theme(&mut self, _: &mut Script, theme: Theme) {
        self.theme = theme;
    }

    fn import(&mut self, _: &mut Script, settings: Json<Settings>) {
        self.settings = settings.into_inner();
    }

    fn attach_all(&mut self, _: &mut Script, files: Vec<Attachment>) {
        self.documents = files
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.file_name.unwrap_or_else(|| format!("document {}", i + 1)))
            .collect();
    }

    fn promote(&mut self, js: &mut Script) {
        self.admin = true;
        js.alert(&format!("{} is now an administrator", self.user));
    }

    fn created(&mut self, _: &mut Script) {
        if self.display_name.is_empty() {
            self.display_name = self.user.clone();
        }
    }
}

impl ViewModel for Profile {
    fn schema() -> SchemaBuilder<Self> {
        Schema::builder()
            .prop("user", "userName")
            .action(
                Action::new("rename", Self::rename)
                    .params(["new_name", "upload"])
                    .post_script("this.$refs.avatar.value = ''"),
            )
            .action(Action::new("set_theme", Self::set_theme).params(["theme"]))
            .action(Action::new("import", Self::import).params(["settings"]))
            .action(Action::new("attach_all", Self::attach_all).params(["files"]))
            .action(Action::new("promote", Self::promote).roles(["Admin"]))
            .created(Self::created)
    }
}

pub fn markup() -> Markup {
    Markup::new(TEMPLATE).with_mixin(MIXIN)
}
