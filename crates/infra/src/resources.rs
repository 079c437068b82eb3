//! Typed resource declarations. Field names serialize to the provider's
//! camelCase property names; maps are ordered so rendering is stable.

use std::collections::BTreeMap;

use serde::Serialize;

pub const SERVICE_TYPE: &str = "gcp:cloudrun:Service";
pub const IAM_POLICY_TYPE: &str = "gcp:cloudrun:IamPolicy";
pub const BUCKET_TYPE: &str = "gcp:storage:Bucket";

pub const INVOKER_ROLE: &str = "roles/run.invoker";
pub const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
pub const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";
pub const EXECUTION_ENVIRONMENT_ANNOTATION: &str = "run.googleapis.com/execution-environment";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    Gen1,
    Gen2,
}

impl ExecutionEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gen1 => "gen1",
            Self::Gen2 => "gen2",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scaling {
    pub min_instances: u32,
    pub max_instances: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudRunService {
    pub location: String,
    pub template: ServiceTemplate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
    pub spec: TemplateSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TemplateMetadata {
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateSpec {
    pub containers: Vec<Container>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Container {
    pub image: String,
    pub ports: Vec<ContainerPort>,
    pub resources: ResourceLimits,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvVar>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceLimits {
    pub limits: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl CloudRunService {
    pub fn new(location: &str, container: Container) -> Self {
        Self {
            location: location.to_string(),
            template: ServiceTemplate {
                metadata: None,
                spec: TemplateSpec { containers: vec![container] },
            },
        }
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        let annotations = self.annotations_mut();
        annotations.insert(MIN_SCALE_ANNOTATION.to_string(), scaling.min_instances.to_string());
        annotations.insert(MAX_SCALE_ANNOTATION.to_string(), scaling.max_instances.to_string());
        self
    }

    pub fn with_execution_environment(mut self, environment: ExecutionEnvironment) -> Self {
        self.annotations_mut()
            .insert(EXECUTION_ENVIRONMENT_ANNOTATION.to_string(), environment.as_str().to_string());
        self
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.template.metadata.get_or_insert_with(TemplateMetadata::default).annotations
    }
}

impl Container {
    pub fn new(image: &str, port: u16, cpu: &str, memory: &str) -> Self {
        Self {
            image: image.to_string(),
            ports: vec![ContainerPort { container_port: port, name: "http1".to_string() }],
            resources: ResourceLimits {
                limits: BTreeMap::from([
                    ("cpu".to_string(), cpu.to_string()),
                    ("memory".to_string(), memory.to_string()),
                ]),
            },
            envs: Vec::new(),
        }
    }

    pub fn with_env(mut self, name: &str, value: impl Into<String>) -> Self {
        self.envs.push(EnvVar { name: name.to_string(), value: value.into() });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicy {
    pub location: String,
    pub project: String,
    pub service: String,
    pub policy_data: String,
}

#[derive(Serialize)]
struct PolicyData<'a> {
    bindings: [Binding<'a>; 1],
}

#[derive(Serialize)]
struct Binding<'a> {
    role: &'a str,
    members: &'a [String],
}

impl IamPolicy {
    /// Binds the invoker role on the service declared as `service_resource`.
    pub fn invoker(service_resource: &str, members: &[String]) -> Result<Self, serde_json::Error> {
        let policy_data = serde_json::to_string(&PolicyData {
            bindings: [Binding { role: INVOKER_ROLE, members }],
        })?;
        Ok(Self {
            location: format!("${{{service_resource}.location}}"),
            project: format!("${{{service_resource}.project}}"),
            service: format!("${{{service_resource}.name}}"),
            policy_data,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucket {
    pub name: String,
    pub location: String,
    pub uniform_bucket_level_access: bool,
}

impl StorageBucket {
    pub fn new(name: String, location: &str) -> Self {
        Self { name, location: location.to_ascii_uppercase(), uniform_bucket_level_access: true }
    }
}
