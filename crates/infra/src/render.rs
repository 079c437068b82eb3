use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::StackError;
use crate::resources::{
    CloudRunService, IamPolicy, StorageBucket, BUCKET_TYPE, IAM_POLICY_TYPE, SERVICE_TYPE,
};
use crate::variants::{Stack, BUCKET_RESOURCE, POLICY_RESOURCE, SERVICE_RESOURCE};

pub const PROGRAM_NAME: &str = "intuneai";
const PROGRAM_RUNTIME: &str = "yaml";

/// A Pulumi YAML program. JSON is a subset of YAML, so the rendered JSON is
/// accepted as `Pulumi.yaml` directly.
#[derive(Debug, Serialize)]
pub struct Program<'a> {
    pub name: &'static str,
    pub runtime: &'static str,
    pub description: String,
    pub resources: BTreeMap<&'static str, Resource<'a>>,
    pub outputs: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct Resource<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: Properties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Properties<'a> {
    Service(&'a CloudRunService),
    Policy(&'a IamPolicy),
    Bucket(&'a StorageBucket),
}

impl Stack {
    pub fn program(&self) -> Program<'_> {
        let mut resources = BTreeMap::from([
            (
                SERVICE_RESOURCE,
                Resource { kind: SERVICE_TYPE, properties: Properties::Service(&self.service) },
            ),
            (
                POLICY_RESOURCE,
                Resource { kind: IAM_POLICY_TYPE, properties: Properties::Policy(&self.policy) },
            ),
        ]);
        if let Some(bucket) = &self.bucket {
            resources.insert(
                BUCKET_RESOURCE,
                Resource { kind: BUCKET_TYPE, properties: Properties::Bucket(bucket) },
            );
        }

        Program {
            name: PROGRAM_NAME,
            runtime: PROGRAM_RUNTIME,
            description: format!("InTuneAI Cloud Run deployment ({})", self.variant.as_str()),
            resources,
            outputs: self.outputs(),
        }
    }

    pub fn outputs(&self) -> BTreeMap<&'static str, String> {
        let mut outputs = BTreeMap::from([
            ("service_url", format!("${{{SERVICE_RESOURCE}.statuses[0].url}}")),
            ("service_name", format!("${{{SERVICE_RESOURCE}.name}}")),
        ]);
        if self.bucket.is_some() {
            outputs.insert("bucket_url", format!("${{{BUCKET_RESOURCE}.url}}"));
        }
        outputs
    }
}

/// Renders the stack as pretty-printed JSON with a trailing newline.
pub fn render(stack: &Stack) -> Result<String, StackError> {
    let mut rendered = serde_json::to_string_pretty(&stack.program())?;
    rendered.push('\n');
    debug!(
        event_name = "infra.stack.rendered",
        variant = stack.variant.as_str(),
        bytes = rendered.len(),
        "stack rendered"
    );
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::render;
    use crate::config::{InvokerAccess, StackConfig, Variant, DEFAULT_IMAGE};
    use crate::variants::declare;

    fn config(invokers: InvokerAccess) -> StackConfig {
        StackConfig {
            project: Some("proj-1".to_string()),
            region: "us-central1".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            use_vertexai: true,
            invokers,
        }
    }

    fn rendered(variant: Variant, invokers: InvokerAccess) -> Value {
        let stack = declare(variant, &config(invokers)).expect("stack");
        serde_json::from_str(&render(&stack).expect("render")).expect("valid json")
    }

    #[test]
    fn rendering_is_byte_identical_across_runs() {
        let members = InvokerAccess::Members(vec![
            "user:b@example.com".to_string(),
            "user:a@example.com".to_string(),
        ]);
        for variant in [Variant::Basic, Variant::Scaled, Variant::Storage] {
            let first = render(&declare(variant, &config(members.clone())).expect("stack"))
                .expect("render");
            let second = render(&declare(variant, &config(members.clone())).expect("stack"))
                .expect("render");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn basic_program_has_service_policy_and_two_outputs() {
        let program = rendered(Variant::Basic, InvokerAccess::Public);

        assert_eq!(program["runtime"], "yaml");
        assert_eq!(program["resources"]["intuneai-service"]["type"], "gcp:cloudrun:Service");
        assert_eq!(
            program["resources"]["intuneai-service-policy"]["type"],
            "gcp:cloudrun:IamPolicy"
        );
        assert_eq!(
            program["resources"]["intuneai-service-policy"]["properties"]["service"],
            "${intuneai-service.name}"
        );
        assert_eq!(program["outputs"]["service_url"], "${intuneai-service.statuses[0].url}");
        assert_eq!(program["outputs"]["service_name"], "${intuneai-service.name}");
        assert!(program["outputs"].get("bucket_url").is_none());
        assert!(program["resources"].get("intuneai-artifacts").is_none());
    }

    #[test]
    fn storage_program_exports_the_bucket_url() {
        let program = rendered(Variant::Storage, InvokerAccess::Public);

        assert_eq!(program["resources"]["intuneai-artifacts"]["type"], "gcp:storage:Bucket");
        assert_eq!(
            program["resources"]["intuneai-artifacts"]["properties"]["name"],
            "proj-1-intuneai-artifacts"
        );
        assert_eq!(program["outputs"]["bucket_url"], "${intuneai-artifacts.url}");
    }

    #[test]
    fn public_access_appears_only_when_selected() {
        let caller = "serviceAccount:caller@proj-1.iam.gserviceaccount.com".to_string();
        let restricted = rendered(Variant::Basic, InvokerAccess::Members(vec![caller]));
        let policy = restricted["resources"]["intuneai-service-policy"]["properties"]["policyData"]
            .as_str()
            .expect("policy data");
        assert!(!policy.contains("allUsers"));

        let public = rendered(Variant::Basic, InvokerAccess::Public);
        let policy = public["resources"]["intuneai-service-policy"]["properties"]["policyData"]
            .as_str()
            .expect("policy data");
        assert!(policy.contains("allUsers"));
    }
}
