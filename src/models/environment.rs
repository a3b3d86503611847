//! Environments and variable mutations

use serde::{Deserialize, Serialize};

use super::types::VariableTable;

/// A named set of variables that can be activated independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: VariableTable,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Environment {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            variables: VariableTable::new(),
            is_active: true,
            created_at: None,
        }
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Payload for creating or updating an environment
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInput {
    pub name: String,
    pub variables: VariableTable,
}

/// A variable write performed by a script, addressed to one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentUpdate {
    pub environment_id: String,
    pub key: String,
    pub value: String,
}

impl EnvironmentUpdate {
    /// Apply this write to the matching environment in `environments`
    pub fn apply_to(&self, environments: &mut [Environment]) -> bool {
        match environments.iter_mut().find(|e| e.id == self.environment_id) {
            Some(env) => {
                env.variables.insert(self.key.clone(), self.value.clone());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_json_shape() {
        let env: Environment = serde_json::from_str(
            r#"{"_id":"e1","name":"dev","variables":{"base":"http://localhost"},"isActive":true}"#,
        )
        .unwrap();
        assert_eq!(env.id, "e1");
        assert!(env.is_active);
        assert_eq!(env.variables["base"], "http://localhost");
    }

    #[test]
    fn test_apply_update() {
        let mut envs = vec![Environment::new("a", "A"), Environment::new("b", "B")];
        let update = EnvironmentUpdate {
            environment_id: "b".to_string(),
            key: "token".to_string(),
            value: "abc".to_string(),
        };
        assert!(update.apply_to(&mut envs));
        assert!(envs[0].variables.is_empty());
        assert_eq!(envs[1].variables["token"], "abc");

        let missing = EnvironmentUpdate {
            environment_id: "zzz".to_string(),
            ..update
        };
        assert!(!missing.apply_to(&mut envs));
    }
}
