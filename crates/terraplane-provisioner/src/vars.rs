// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parameter translation for tool invocations.

use terraplane_protocol::messages::{ParameterDestination, ParameterValue};

use crate::error::{ProvisionError, Result};

/// Parameters translated into tool-facing form.
#[derive(Debug, Default, Clone)]
pub struct TranslatedParameters {
    /// Pairs passed as `-var name=value` arguments
    pub vars: Vec<(String, String)>,
    /// Pairs injected into the tool process environment
    pub env: Vec<(String, String)>,
}

impl TranslatedParameters {
    /// Render the variable pairs as `-var` command-line arguments.
    pub fn var_args(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|(name, value)| ["-var".to_string(), format!("{name}={value}")])
            .collect()
    }
}

/// Translate wire parameters into variables and environment entries.
///
/// Fails on the first parameter with an unknown destination scheme, before
/// any tool process is started.
pub fn translate(parameters: &[ParameterValue]) -> Result<TranslatedParameters> {
    let mut translated = TranslatedParameters::default();
    for parameter in parameters {
        match parameter.destination() {
            Some(ParameterDestination::ProvisionerVariable) => {
                translated
                    .vars
                    .push((parameter.name.clone(), parameter.value.clone()));
            }
            Some(ParameterDestination::Environment) => {
                translated
                    .env
                    .push((parameter.name.clone(), parameter.value.clone()));
            }
            None => {
                return Err(ProvisionError::UnsupportedParameterScheme {
                    scheme: parameter.destination_scheme,
                    name: parameter.name.clone(),
                });
            }
        }
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(scheme: i32, name: &str, value: &str) -> ParameterValue {
        ParameterValue {
            destination_scheme: scheme,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_translate_splits_destinations() {
        let translated = translate(&[
            param(ParameterDestination::ProvisionerVariable as i32, "region", "eu-west-1"),
            param(ParameterDestination::Environment as i32, "TF_LOG", "TRACE"),
            param(ParameterDestination::ProvisionerVariable as i32, "size", "large"),
        ])
        .unwrap();

        assert_eq!(
            translated.vars,
            vec![
                ("region".to_string(), "eu-west-1".to_string()),
                ("size".to_string(), "large".to_string()),
            ]
        );
        assert_eq!(translated.env, vec![("TF_LOG".to_string(), "TRACE".to_string())]);
    }

    #[test]
    fn test_var_args_shape() {
        let translated = translate(&[param(
            ParameterDestination::ProvisionerVariable as i32,
            "region",
            "eu-west-1",
        )])
        .unwrap();

        assert_eq!(translated.var_args(), vec!["-var", "region=eu-west-1"]);
    }

    #[test]
    fn test_unknown_scheme_fails_fast() {
        let err = translate(&[
            param(ParameterDestination::ProvisionerVariable as i32, "ok", "1"),
            param(88, "mystery", "2"),
        ])
        .unwrap_err();

        match err {
            ProvisionError::UnsupportedParameterScheme { scheme, name } => {
                assert_eq!(scheme, 88);
                assert_eq!(name, "mystery");
            }
            other => panic!("expected UnsupportedParameterScheme, got {other:?}"),
        }
    }
}
