// Schema description types — the field-descriptor table interpreted at
// validation and serialization time. Plugins contribute whole tables or
// extra fields on the core tables; the merged description drives output
// filtering (`returned: false` strips a field from API and cookie-cache
// payloads) and migration generation in external tooling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Field types supported by the schema system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
}

/// A single field definition within a table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// If true, the field is auto-set to the current timestamp on create.
    #[serde(default)]
    pub auto_set_on_create: bool,
    #[serde(default)]
    pub auto_set_on_update: bool,
    /// Foreign key reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<FieldReference>,
    /// Whether this field is included in API output and cached payloads.
    /// Default: true.
    #[serde(default = "default_true")]
    pub returned: bool,
    /// Whether the field accepts user input. Default: true.
    #[serde(default = "default_true")]
    pub input: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaField {
    pub fn required_string() -> Self {
        Self {
            field_type: FieldType::String,
            required: true,
            unique: false,
            default_value: None,
            auto_set_on_create: false,
            auto_set_on_update: false,
            references: None,
            returned: true,
            input: true,
        }
    }

    pub fn optional_string() -> Self {
        Self {
            required: false,
            ..Self::required_string()
        }
    }

    pub fn boolean(default: bool) -> Self {
        Self {
            field_type: FieldType::Boolean,
            required: false,
            default_value: Some(serde_json::Value::Bool(default)),
            ..Self::required_string()
        }
    }

    pub fn created_at() -> Self {
        Self {
            field_type: FieldType::Date,
            auto_set_on_create: true,
            ..Self::required_string()
        }
    }

    pub fn updated_at() -> Self {
        Self {
            field_type: FieldType::Date,
            auto_set_on_create: true,
            auto_set_on_update: true,
            ..Self::required_string()
        }
    }

    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_reference(mut self, table: &str, field: &str) -> Self {
        self.references = Some(FieldReference {
            model: table.to_string(),
            field: field.to_string(),
            on_delete: None,
        });
        self
    }

    /// Mark the field as non-returnable (stripped from output).
    pub fn hidden(mut self) -> Self {
        self.returned = false;
        self
    }
}

/// Foreign key reference configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldReference {
    pub model: String,
    /// Field name in the referenced table (usually "id").
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
}

/// A complete table definition within the auth schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTable {
    pub name: String,
    pub fields: HashMap<String, SchemaField>,
}

impl AuthTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: HashMap::new(),
        }
    }

    pub fn field(mut self, name: &str, schema_field: SchemaField) -> Self {
        self.fields.insert(name.to_string(), schema_field);
        self
    }

    /// Names of fields declared `returned: false`.
    pub fn hidden_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.returned)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// The merged auth schema: table name → definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSchema {
    pub tables: HashMap<String, AuthTable>,
}

impl AuthSchema {
    pub fn table(mut self, table: AuthTable) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AuthTable> {
        self.tables.get(name)
    }
}

/// Strip non-returnable fields from a record according to its table schema.
///
/// Applied to API responses and to the cookie-cache payload before signing.
pub fn filter_returned(record: &serde_json::Value, table: Option<&AuthTable>) -> serde_json::Value {
    let mut out = record.clone();
    if let (Some(obj), Some(table)) = (out.as_object_mut(), table) {
        for field in table.hidden_fields() {
            obj.remove(field);
        }
        // Credential hashes never leave the engine, schema or not.
        obj.remove("password");
    } else if let Some(obj) = out.as_object_mut() {
        obj.remove("password");
    }
    out
}

/// Build the core auth schema (user, session, account, verification).
pub fn core_schema() -> AuthSchema {
    AuthSchema::default()
        .table(
            AuthTable::new("user")
                .field("id", SchemaField::required_string())
                .field("name", SchemaField::required_string())
                .field("email", SchemaField::required_string().with_unique())
                .field("emailVerified", SchemaField::boolean(false))
                .field("image", SchemaField::optional_string())
                .field("createdAt", SchemaField::created_at())
                .field("updatedAt", SchemaField::updated_at()),
        )
        .table(
            AuthTable::new("session")
                .field("id", SchemaField::required_string())
                .field("token", SchemaField::required_string().with_unique())
                .field("userId", SchemaField::required_string().with_reference("user", "id"))
                .field("expiresAt", SchemaField::required_string())
                .field("ipAddress", SchemaField::optional_string())
                .field("userAgent", SchemaField::optional_string())
                .field("activeOrganizationId", SchemaField::optional_string())
                .field("activeTeamId", SchemaField::optional_string())
                .field("tenantId", SchemaField::optional_string())
                .field("createdAt", SchemaField::created_at())
                .field("updatedAt", SchemaField::updated_at()),
        )
        .table(
            AuthTable::new("account")
                .field("id", SchemaField::required_string())
                .field("accountId", SchemaField::required_string())
                .field("providerId", SchemaField::required_string())
                .field("userId", SchemaField::required_string().with_reference("user", "id"))
                .field("accessToken", SchemaField::optional_string())
                .field("refreshToken", SchemaField::optional_string())
                .field("idToken", SchemaField::optional_string())
                .field("accessTokenExpiresAt", SchemaField::optional_string())
                .field("refreshTokenExpiresAt", SchemaField::optional_string())
                .field("scope", SchemaField::optional_string())
                .field("password", SchemaField::optional_string().hidden())
                .field("createdAt", SchemaField::created_at())
                .field("updatedAt", SchemaField::updated_at()),
        )
        .table(
            AuthTable::new("verification")
                .field("id", SchemaField::required_string())
                .field("identifier", SchemaField::required_string().with_unique())
                .field("value", SchemaField::required_string())
                .field("expiresAt", SchemaField::required_string())
                .field("createdAt", SchemaField::created_at())
                .field("updatedAt", SchemaField::updated_at()),
        )
}
