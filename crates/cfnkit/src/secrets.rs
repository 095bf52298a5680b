//! Secrets Manager declarations

use crate::names;
use declarative::{Error, Handle, RemovalPolicy, Resource, Result, intrinsic};
use serde_json::{Value, json};

/// Characters RDS refuses in a master password
const RDS_FORBIDDEN: [char; 4] = ['/', '@', '"', ' '];

/// How the backend generates the secret value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSecretString {
    pub username: String,
    pub generate_string_key: String,
    pub password_length: u32,
    pub exclude_punctuation: bool,
    pub include_space: bool,
    pub exclude_characters: String,
}

impl GenerateSecretString {
    /// A `{"username": ..., "password": <generated>}` secret with no
    /// punctuation and no spaces
    pub fn for_username(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            generate_string_key: "password".to_string(),
            password_length: 30,
            exclude_punctuation: true,
            include_space: false,
            exclude_characters: String::new(),
        }
    }

    /// Whether every possible generated value is an acceptable RDS password
    pub fn is_rds_compatible(&self) -> bool {
        if self.include_space {
            return false;
        }
        self.exclude_punctuation
            || RDS_FORBIDDEN
                .iter()
                .filter(|c| **c != ' ')
                .all(|c| self.exclude_characters.contains(*c))
    }

    fn to_json(&self) -> Value {
        let template = json!({ "username": self.username }).to_string();
        let mut value = json!({
            "ExcludePunctuation": self.exclude_punctuation,
            "GenerateStringKey": self.generate_string_key,
            "IncludeSpace": self.include_space,
            "PasswordLength": self.password_length,
            "SecretStringTemplate": template,
        });
        if !self.exclude_characters.is_empty() {
            value["ExcludeCharacters"] = json!(self.exclude_characters);
        }
        value
    }
}

/// `AWS::SecretsManager::Secret` with a generated value
#[derive(Debug, Clone)]
pub struct Secret {
    id: String,
    name: String,
    description: String,
    generate: GenerateSecretString,
    removal_policy: Option<RemovalPolicy>,
}

impl Secret {
    pub fn generated(
        id: impl Into<String>,
        name: impl Into<String>,
        generate: GenerateSecretString,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            description: format!("Generated credentials {name}"),
            name,
            generate,
            removal_policy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn generation(&self) -> &GenerateSecretString {
        &self.generate
    }
}

impl Resource for Secret {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::SecretsManager::Secret"
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn properties(&self) -> Value {
        json!({
            "Description": self.description,
            "GenerateSecretString": self.generate.to_json(),
            "Name": self.name,
        })
    }

    fn physical_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        self.removal_policy
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<()> {
        names::secret_name(&self.name)?;
        if !(8..=4096).contains(&self.generate.password_length) {
            return Err(Error::InvalidProperty {
                resource: self.id.clone(),
                property: "PasswordLength",
                reason: format!("{} is outside 8-4096", self.generate.password_length),
            });
        }
        Ok(())
    }
}

/// Dynamic reference to one JSON field of a secret, resolved by the backend
///
/// Renders as `{{resolve:secretsmanager:<secret>:SecretString:<field>::}}`,
/// so the value never appears in the template.
pub fn secret_field(secret: &Handle, field: &str) -> Value {
    intrinsic::join(
        "",
        vec![
            json!("{{resolve:secretsmanager:"),
            secret.reference(),
            json!(format!(":SecretString:{field}::}}}}")),
        ],
    )
}

/// `AWS::SecretsManager::SecretTargetAttachment` - records connection
/// details of the target in the secret
#[derive(Debug, Clone)]
pub struct SecretAttachment {
    id: String,
    secret: Handle,
    target: Handle,
    target_type: &'static str,
}

impl SecretAttachment {
    pub fn new(
        id: impl Into<String>,
        secret: &Handle,
        target: &Handle,
        target_type: &'static str,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.clone(),
            target: target.clone(),
            target_type,
        }
    }
}

impl Resource for SecretAttachment {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::SecretsManager::SecretTargetAttachment"
    }

    fn properties(&self) -> Value {
        json!({
            "SecretId": self.secret.reference(),
            "TargetId": self.target.reference(),
            "TargetType": self.target_type,
        })
    }

    fn is_taggable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceGraph;

    #[test]
    fn test_generation_properties() {
        let secret = Secret::generated(
            "DatabaseSecret",
            "AppStack/database-credentials",
            GenerateSecretString::for_username("postgres"),
        )
        .with_removal_policy(RemovalPolicy::Destroy);

        let props = secret.properties();
        let generate = &props["GenerateSecretString"];
        assert_eq!(generate["ExcludePunctuation"], true);
        assert_eq!(generate["IncludeSpace"], false);
        assert_eq!(generate["GenerateStringKey"], "password");
        assert_eq!(generate["SecretStringTemplate"], r#"{"username":"postgres"}"#);
    }

    #[test]
    fn test_rds_compatibility() {
        let mut generate = GenerateSecretString::for_username("postgres");
        assert!(generate.is_rds_compatible());

        generate.exclude_punctuation = false;
        assert!(!generate.is_rds_compatible());

        generate.exclude_characters = "/@\"".to_string();
        assert!(generate.is_rds_compatible());

        generate.include_space = true;
        assert!(!generate.is_rds_compatible());
    }

    #[test]
    fn test_secret_field_is_a_dynamic_reference() {
        let mut graph = ResourceGraph::new("Unit");
        let secret = graph
            .add(
                &Secret::generated(
                    "DatabaseSecret",
                    "unit/db",
                    GenerateSecretString::for_username("postgres"),
                )
                .with_removal_policy(RemovalPolicy::Destroy),
            )
            .unwrap();

        let field = secret_field(&secret, "password");
        assert_eq!(
            field,
            json!({ "Fn::Join": ["", [
                "{{resolve:secretsmanager:",
                { "Ref": "DatabaseSecret" },
                ":SecretString:password::}}",
            ]] })
        );
    }

    #[test]
    fn test_password_length_bounds() {
        let mut generate = GenerateSecretString::for_username("postgres");
        generate.password_length = 4;
        let secret = Secret::generated("S", "unit/db", generate)
            .with_removal_policy(RemovalPolicy::Destroy);
        assert!(matches!(
            secret.validate(),
            Err(Error::InvalidProperty { property: "PasswordLength", .. })
        ));
    }
}
