//! EC2 declarations: instances, security groups, machine images

use crate::names;
use declarative::{Handle, Parameter, Resource, ResourceGraph, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceClass {
    T3,
    T3a,
    T4g,
    M5,
}

impl InstanceClass {
    fn as_str(&self) -> &'static str {
        match self {
            Self::T3 => "t3",
            Self::T3a => "t3a",
            Self::T4g => "t4g",
            Self::M5 => "m5",
        }
    }

    /// Burstable classes earn CPU credits instead of fixed performance
    pub fn is_burstable(&self) -> bool {
        matches!(self, Self::T3 | Self::T3a | Self::T4g)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
}

impl InstanceSize {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Nano => "nano",
            Self::Micro => "micro",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Instance class and size, e.g. `t3.micro`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self { class, size }
    }

    /// Database class name, e.g. `db.t3.micro`
    pub fn db_class(&self) -> String {
        format!("db.{self}")
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.as_str(), self.size.as_str())
    }
}

/// Where an instance's image id comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineImage {
    /// Latest Amazon Linux 2023, looked up from the public SSM parameter at deploy time
    LatestAmazonLinux2023,
    /// A fixed image id
    Id(String),
}

const AL2023_SSM_PATH: &str = "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64";
const AL2023_PARAMETER_ID: &str = "SsmParameterValueAmazonLinux2023ImageId";

impl MachineImage {
    /// Image id value, declaring the lookup parameter the first time it is needed
    pub fn image_id(&self, graph: &mut ResourceGraph) -> Result<Value> {
        match self {
            Self::Id(id) => Ok(json!(id)),
            Self::LatestAmazonLinux2023 => {
                if graph.is_declared(AL2023_PARAMETER_ID) {
                    return Ok(json!({ "Ref": AL2023_PARAMETER_ID }));
                }
                let handle = graph.add_parameter(
                    AL2023_PARAMETER_ID,
                    Parameter {
                        param_type: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
                        default: Some(AL2023_SSM_PATH.to_string()),
                        description: Some("Latest Amazon Linux 2023 image".to_string()),
                    },
                )?;
                Ok(handle.reference())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    All,
}

impl Protocol {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::All => "-1",
        }
    }
}

/// Protocol and port range of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub protocol: Protocol,
    pub from: u16,
    pub to: u16,
}

impl Port {
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from: port,
            to: port,
        }
    }
}

/// Traffic source of an ingress rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    AnyIpv4,
    Ipv4(String),
}

impl Peer {
    pub fn cidr(&self) -> &str {
        match self {
            Self::AnyIpv4 => "0.0.0.0/0",
            Self::Ipv4(cidr) => cidr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: Port,
    pub description: String,
}

impl IngressRule {
    fn to_json(&self) -> Value {
        json!({
            "CidrIp": self.peer.cidr(),
            "Description": self.description,
            "FromPort": self.port.from,
            "IpProtocol": self.port.protocol.as_str(),
            "ToPort": self.port.to,
        })
    }
}

/// `AWS::EC2::SecurityGroup`
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    id: String,
    name: Option<String>,
    description: String,
    vpc: Handle,
    ingress: Vec<IngressRule>,
    allow_all_outbound: bool,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>, description: impl Into<String>, vpc: &Handle) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: description.into(),
            vpc: vpc.clone(),
            ingress: Vec::new(),
            allow_all_outbound: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ingress(mut self, peer: Peer, port: Port, description: impl Into<String>) -> Self {
        self.ingress.push(IngressRule {
            peer,
            port,
            description: description.into(),
        });
        self
    }

    pub fn ingress(&self) -> &[IngressRule] {
        &self.ingress
    }

    /// Whether any ingress rule is open to the whole IPv4 internet
    pub fn allows_any_ipv4(&self) -> bool {
        self.ingress.iter().any(|r| r.peer == Peer::AnyIpv4)
    }
}

impl Resource for SecurityGroup {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::EC2::SecurityGroup"
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn properties(&self) -> Value {
        let mut props = json!({
            "GroupDescription": self.description,
            "VpcId": self.vpc.reference(),
        });
        if let Some(name) = &self.name {
            props["GroupName"] = json!(name);
        }
        if !self.ingress.is_empty() {
            let rules: Vec<Value> = self.ingress.iter().map(IngressRule::to_json).collect();
            props["SecurityGroupIngress"] = Value::Array(rules);
        }
        if self.allow_all_outbound {
            props["SecurityGroupEgress"] = json!([{
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1",
            }]);
        }
        props
    }

    fn physical_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn validate(&self) -> Result<()> {
        match &self.name {
            Some(name) => names::security_group_name(name),
            None => Ok(()),
        }
    }
}

/// `AWS::EC2::Instance`
///
/// The instance profile is bound explicitly; no implicit profile is created
/// for the role.
#[derive(Debug, Clone)]
pub struct Instance {
    id: String,
    instance_type: InstanceType,
    image_id: Value,
    subnet: Handle,
    security_groups: Vec<Handle>,
    instance_profile: Handle,
    role: Handle,
    name_tag: String,
}

impl Instance {
    pub fn new(
        id: impl Into<String>,
        instance_type: InstanceType,
        image_id: Value,
        subnet: &Handle,
        instance_profile: &Handle,
        role: &Handle,
    ) -> Self {
        let id = id.into();
        Self {
            name_tag: id.clone(),
            id,
            instance_type,
            image_id,
            subnet: subnet.clone(),
            security_groups: Vec::new(),
            instance_profile: instance_profile.clone(),
            role: role.clone(),
        }
    }

    pub fn with_security_group(mut self, group: &Handle) -> Self {
        self.security_groups.push(group.clone());
        self
    }

    pub fn with_name_tag(mut self, name: impl Into<String>) -> Self {
        self.name_tag = name.into();
        self
    }
}

impl Resource for Instance {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::EC2::Instance"
    }

    fn description(&self) -> String {
        format!("{} instance {}", self.instance_type, self.name_tag)
    }

    fn properties(&self) -> Value {
        let groups: Vec<Value> = self
            .security_groups
            .iter()
            .map(|g| g.attr("GroupId"))
            .collect();
        json!({
            "IamInstanceProfile": self.instance_profile.reference(),
            "ImageId": self.image_id,
            "InstanceType": self.instance_type.to_string(),
            "SecurityGroupIds": groups,
            "SubnetId": self.subnet.reference(),
            "Tags": [{ "Key": "Name", "Value": self.name_tag }],
        })
    }

    fn depends_on(&self) -> Vec<String> {
        vec![self.role.logical_id().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_type_names() {
        let t = InstanceType::of(InstanceClass::T3, InstanceSize::Micro);
        assert_eq!(t.to_string(), "t3.micro");
        assert_eq!(t.db_class(), "db.t3.micro");
        assert!(t.class.is_burstable());
        assert!(!InstanceClass::M5.is_burstable());
    }

    #[test]
    fn test_machine_image_parameter_declared_once() {
        let mut graph = ResourceGraph::new("Unit");
        let first = MachineImage::LatestAmazonLinux2023
            .image_id(&mut graph)
            .unwrap();
        let second = MachineImage::LatestAmazonLinux2023
            .image_id(&mut graph)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.parameters().len(), 1);
        assert_eq!(
            graph.parameters()[AL2023_PARAMETER_ID].default.as_deref(),
            Some(AL2023_SSM_PATH)
        );

        let fixed = MachineImage::Id("ami-123".into())
            .image_id(&mut graph)
            .unwrap();
        assert_eq!(fixed, json!("ami-123"));
    }

    #[test]
    fn test_security_group_rules() {
        let mut graph = ResourceGraph::new("Unit");
        let vpc = crate::vpc::Vpc::new("Vpc").declare(&mut graph).unwrap().vpc;
        let group = SecurityGroup::new("DbSg", "Database access", &vpc)
            .with_name("unit-database-sg")
            .with_ingress(Peer::AnyIpv4, Port::tcp(5432), "PostgreSQL");
        assert!(group.allows_any_ipv4());

        let handle = graph.add(&group).unwrap();
        let props = &graph.node(&handle).unwrap().properties;
        assert_eq!(
            props["SecurityGroupIngress"],
            json!([{
                "CidrIp": "0.0.0.0/0",
                "Description": "PostgreSQL",
                "FromPort": 5432,
                "IpProtocol": "tcp",
                "ToPort": 5432,
            }])
        );
        assert_eq!(props["GroupName"], "unit-database-sg");
    }
}
