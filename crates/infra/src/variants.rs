use tracing::debug;

use crate::config::{StackConfig, StackError, Variant, ENV_PROJECT, ENV_REGION, ENV_USE_VERTEXAI};
use crate::resources::{
    CloudRunService, Container, ExecutionEnvironment, IamPolicy, Scaling, StorageBucket,
};

pub const SERVICE_RESOURCE: &str = "intuneai-service";
pub const POLICY_RESOURCE: &str = "intuneai-service-policy";
pub const BUCKET_RESOURCE: &str = "intuneai-artifacts";

pub const CONTAINER_PORT: u16 = 8080;
pub const CPU_LIMIT: &str = "1000m";
pub const MEMORY_LIMIT: &str = "512Mi";
pub const SCALED_BOUNDS: Scaling = Scaling { min_instances: 0, max_instances: 3 };

/// Every resource a variant declares, ready to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stack {
    pub variant: Variant,
    pub service: CloudRunService,
    pub policy: IamPolicy,
    pub bucket: Option<StorageBucket>,
}

pub fn declare(variant: Variant, config: &StackConfig) -> Result<Stack, StackError> {
    let stack = match variant {
        Variant::Basic => basic(config)?,
        Variant::Scaled => scaled(config)?,
        Variant::Storage => storage(config)?,
    };
    debug!(
        event_name = "infra.stack.declared",
        variant = variant.as_str(),
        region = %config.region,
        public = config.invokers.is_public(),
        bucket = stack.bucket.is_some(),
        "stack declared"
    );
    Ok(stack)
}

fn basic(config: &StackConfig) -> Result<Stack, StackError> {
    let container = Container::new(&config.image, CONTAINER_PORT, CPU_LIMIT, MEMORY_LIMIT);
    Ok(Stack {
        variant: Variant::Basic,
        service: CloudRunService::new(&config.region, container),
        policy: IamPolicy::invoker(SERVICE_RESOURCE, &config.invokers.members())?,
        bucket: None,
    })
}

fn scaled(config: &StackConfig) -> Result<Stack, StackError> {
    let project = config.require_project(Variant::Scaled)?;
    let container = Container::new(&config.image, CONTAINER_PORT, CPU_LIMIT, MEMORY_LIMIT)
        .with_env(ENV_PROJECT, project)
        .with_env(ENV_REGION, config.region.clone())
        .with_env(ENV_USE_VERTEXAI, config.use_vertexai.to_string());
    let service = CloudRunService::new(&config.region, container)
        .with_scaling(SCALED_BOUNDS)
        .with_execution_environment(ExecutionEnvironment::Gen2);

    Ok(Stack {
        variant: Variant::Scaled,
        service,
        policy: IamPolicy::invoker(SERVICE_RESOURCE, &config.invokers.members())?,
        bucket: None,
    })
}

fn storage(config: &StackConfig) -> Result<Stack, StackError> {
    let project = config.require_project(Variant::Storage)?;
    let bucket = StorageBucket::new(format!("{project}-intuneai-artifacts"), &config.region);
    Ok(Stack { variant: Variant::Storage, bucket: Some(bucket), ..scaled(config)? })
}
