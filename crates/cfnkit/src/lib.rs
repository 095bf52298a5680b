//! CloudFormation resource kinds for declaration graphs.
//!
//! Each type here implements [`declarative::Resource`] and renders to one
//! CloudFormation resource. A few declarations expand into several
//! resources:
//!
//! - [`vpc::Vpc`] adds subnets, route tables, gateways and NAT per AZ
//! - [`rds::declare_database`] adds the subnet group, monitoring role and
//!   export log groups next to the instance
//!
//! Physical names are checked against the provider's rules in [`names`]
//! when a declaration is added to a graph.
//!
//! # Example
//!
//! ```ignore
//! use cfnkit::iam::{Role, ServicePrincipal, InstanceProfile};
//! use declarative::ResourceGraph;
//!
//! let mut graph = ResourceGraph::new("AppStack");
//! let role = graph.add(&Role::new("BastionRole", ServicePrincipal::ec2()))?;
//! graph.add(&InstanceProfile::new("BastionProfile", "EC2BastionInstanceProfile", &role))?;
//! ```

pub mod ec2;
pub mod iam;
pub mod kms;
pub mod logs;
pub mod names;
pub mod rds;
pub mod secrets;
pub mod vpc;

pub use ec2::{
    Instance, InstanceClass, InstanceSize, InstanceType, MachineImage, Peer, Port, SecurityGroup,
};
pub use iam::{
    InstanceProfile, ManagedPolicy, Policy, PolicyDocument, PolicyStatement, Role,
    ServicePrincipal,
};
pub use kms::{Alias, Key};
pub use logs::{LogGroup, RetentionDays};
pub use rds::{
    DatabaseCredentials, DatabaseHandles, DatabaseOptions, DatabasePlacement,
    PostgresEngineVersion, declare_database,
};
pub use secrets::{GenerateSecretString, Secret, SecretAttachment, secret_field};
pub use vpc::{SubnetType, Vpc, VpcHandles};
