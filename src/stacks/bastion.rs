//! Bastion unit: an SSM-managed jump instance in a private subnet
//!
//! Declaration order is Role, Instance Profile, session Log Group, Network,
//! Instance. The instance is bound to the declared profile; nothing else
//! creates a profile for the role.

use cfnkit::{
    Instance, InstanceProfile, InstanceType, LogGroup, MachineImage, ManagedPolicy, RetentionDays,
    Role, SecurityGroup, ServicePrincipal, SubnetType, Vpc, VpcHandles,
};
use declarative::{Error, Handle, RemovalPolicy, ResourceGraph, Result};

use super::naming::Naming;
use crate::config::BastionConfig;

const ROLE_DESCRIPTION: &str = "Role for EC2 bastion instances";
const MANAGED_POLICIES: [&str; 2] = ["AmazonSSMManagedInstanceCore", "CloudWatchLogsFullAccess"];
/// The unit network always spans two zones
const AVAILABILITY_ZONES: usize = 2;

/// What the bastion unit needs besides names
#[derive(Debug, Clone)]
pub struct BastionSettings {
    pub instance_type: InstanceType,
    pub image: MachineImage,
    pub session_log_retention: RetentionDays,
}

impl From<&BastionConfig> for BastionSettings {
    fn from(config: &BastionConfig) -> Self {
        Self {
            instance_type: InstanceType::of(config.instance_class, config.instance_size),
            image: MachineImage::LatestAmazonLinux2023,
            session_log_retention: config.session_log_retention,
        }
    }
}

/// Handles to everything the bastion unit declared
#[derive(Debug, Clone)]
pub struct BastionHandles {
    pub role: Handle,
    pub instance_profile: Handle,
    pub session_log_group: Handle,
    pub network: VpcHandles,
    pub instance: Handle,
}

/// Declare the bastion resources
pub fn declare(
    graph: &mut ResourceGraph,
    naming: &Naming,
    settings: &BastionSettings,
) -> Result<BastionHandles> {
    let role = MANAGED_POLICIES.iter().fold(
        Role::new("BastionRole", ServicePrincipal::ec2()).with_description(ROLE_DESCRIPTION),
        |role, name| role.with_managed_policy(ManagedPolicy::aws_managed(*name)),
    );
    let role = graph.add(&role)?;

    let instance_profile = graph.add(&InstanceProfile::new(
        "BastionInstanceProfile",
        naming.instance_profile(),
        &role,
    ))?;

    let session_log_group = graph.add(
        &LogGroup::new(
            "SessionLogGroup",
            naming.session_log_group(),
            settings.session_log_retention,
        )
        .with_removal_policy(RemovalPolicy::Destroy),
    )?;

    let network = Vpc::new("Vpc")
        .with_max_azs(AVAILABILITY_ZONES)
        .with_name_prefix(naming.unit())
        .declare(graph)?;

    let subnet = network
        .subnets(SubnetType::PrivateWithEgress)
        .first()
        .cloned()
        .ok_or_else(|| Error::InvalidProperty {
            resource: "Vpc".to_string(),
            property: "SubnetId",
            reason: "no private subnet to place the bastion in".to_string(),
        })?;

    let security_group = graph.add(&SecurityGroup::new(
        "BastionSecurityGroup",
        format!("{}/BastionSecurityGroup", naming.unit()),
        &network.vpc,
    ))?;

    let image_id = settings.image.image_id(graph)?;
    let instance = graph.add(
        &Instance::new(
            "BastionInstance",
            settings.instance_type,
            image_id,
            &subnet,
            &instance_profile,
            &role,
        )
        .with_security_group(&security_group)
        .with_name_tag(format!("{}/BastionInstance", naming.unit())),
    )?;

    log::info!(
        "declared bastion {} in {}",
        settings.instance_type,
        subnet.logical_id()
    );

    Ok(BastionHandles {
        role,
        instance_profile,
        session_log_group,
        network,
        instance,
    })
}

/// Outputs every bastion unit exposes
pub fn declare_outputs(graph: &mut ResourceGraph, handles: &BastionHandles) -> Result<()> {
    graph.add_output(
        "BastionInstanceId",
        handles.instance.reference(),
        Some("Bastion instance id (target for SSM sessions)"),
    )?;
    graph.add_output(
        "BastionRoleArn",
        handles.role.attr("Arn"),
        Some("Role assumed by the bastion instance"),
    )?;
    graph.add_output(
        "InstanceProfileName",
        handles.instance_profile.reference(),
        None,
    )?;
    graph.add_output(
        "SessionLogGroupName",
        handles.session_log_group.reference(),
        Some("Log group receiving session logs"),
    )?;
    Ok(())
}
