//! VPC declaration
//!
//! A [`Vpc`] expands into the VPC itself plus, per availability zone, a
//! public subnet with an internet route and a NAT gateway, and a private
//! subnet whose default route goes through that zone's NAT gateway.

use declarative::{Error, Handle, Resource, ResourceGraph, Result, intrinsic};
use serde_json::{Value, json};
use std::net::Ipv4Addr;

pub const DEFAULT_CIDR: &str = "10.0.0.0/16";

/// Placement class of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetType {
    /// Routed to the internet gateway
    Public,
    /// No inbound route; outbound through a NAT gateway
    PrivateWithEgress,
}

impl SubnetType {
    fn label(&self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::PrivateWithEgress => "Private",
        }
    }
}

/// Handles to the declarations a [`Vpc`] produced
#[derive(Debug, Clone)]
pub struct VpcHandles {
    pub vpc: Handle,
    pub public_subnets: Vec<Handle>,
    pub private_subnets: Vec<Handle>,
    pub nat_gateways: Vec<Handle>,
}

impl VpcHandles {
    /// Subnets of one placement class, one per availability zone
    pub fn subnets(&self, subnet_type: SubnetType) -> &[Handle] {
        match subnet_type {
            SubnetType::Public => &self.public_subnets,
            SubnetType::PrivateWithEgress => &self.private_subnets,
        }
    }

    pub fn availability_zones(&self) -> usize {
        self.public_subnets.len()
    }
}

/// Network with a fixed number of availability zones
#[derive(Debug, Clone)]
pub struct Vpc {
    id: String,
    cidr: String,
    max_azs: usize,
    name_prefix: String,
}

impl Vpc {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name_prefix: id.clone(),
            id,
            cidr: DEFAULT_CIDR.to_string(),
            max_azs: 2,
        }
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    /// Number of availability zones, taken in order from the region's list
    pub fn with_max_azs(mut self, max_azs: usize) -> Self {
        self.max_azs = max_azs;
        self
    }

    /// Prefix of the `Name` tag on every network declaration
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Add the VPC and all of its parts to the graph
    pub fn declare(&self, graph: &mut ResourceGraph) -> Result<VpcHandles> {
        if !(1..=6).contains(&self.max_azs) {
            return Err(Error::InvalidProperty {
                resource: self.id.clone(),
                property: "max_azs",
                reason: format!("{} is outside 1-6", self.max_azs),
            });
        }
        let cidrs = carve_subnets(&self.id, &self.cidr, self.max_azs * 2)?;
        let (public_cidrs, private_cidrs) = cidrs.split_at(self.max_azs);

        let vpc = graph.add(&NetworkPart {
            id: self.id.clone(),
            kind: "AWS::EC2::VPC",
            description: format!("VPC {} across {} zones", self.cidr, self.max_azs),
            properties: json!({
                "CidrBlock": self.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [self.name_tag("")],
            }),
            taggable: true,
            depends_on: Vec::new(),
        })?;

        let igw = graph.add(&NetworkPart {
            id: format!("{}IGW", self.id),
            kind: "AWS::EC2::InternetGateway",
            description: "Internet gateway".to_string(),
            properties: json!({ "Tags": [self.name_tag("")] }),
            taggable: true,
            depends_on: Vec::new(),
        })?;

        let attachment = graph.add(&NetworkPart {
            id: format!("{}VPCGW", self.id),
            kind: "AWS::EC2::VPCGatewayAttachment",
            description: "Internet gateway attachment".to_string(),
            properties: json!({
                "InternetGatewayId": igw.reference(),
                "VpcId": vpc.reference(),
            }),
            taggable: false,
            depends_on: Vec::new(),
        })?;

        let mut public_subnets = Vec::with_capacity(self.max_azs);
        let mut nat_gateways = Vec::with_capacity(self.max_azs);
        for (index, cidr) in public_cidrs.iter().enumerate() {
            let subnet = self.declare_subnet(graph, &vpc, SubnetType::Public, index, cidr)?;
            let prefix = subnet_prefix(&self.id, SubnetType::Public, index);
            let zone_tag =
                self.name_tag(&format!("/{}Subnet{}", SubnetType::Public.label(), index + 1));

            let (table, association) = self.declare_route_table(graph, &vpc, &subnet, &prefix)?;
            let route = graph.add(&NetworkPart {
                id: format!("{prefix}DefaultRoute"),
                kind: "AWS::EC2::Route",
                description: format!("Internet route for public subnet {}", index + 1),
                properties: json!({
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": igw.reference(),
                    "RouteTableId": table.reference(),
                }),
                taggable: false,
                depends_on: vec![attachment.logical_id().to_string()],
            })?;

            let eip = graph.add(&NetworkPart {
                id: format!("{prefix}EIP"),
                kind: "AWS::EC2::EIP",
                description: format!("NAT address for zone {}", index + 1),
                properties: json!({
                    "Domain": "vpc",
                    "Tags": [zone_tag.clone()],
                }),
                taggable: true,
                depends_on: Vec::new(),
            })?;

            let nat = graph.add(&NetworkPart {
                id: format!("{prefix}NATGateway"),
                kind: "AWS::EC2::NatGateway",
                description: format!("NAT gateway for zone {}", index + 1),
                properties: json!({
                    "AllocationId": eip.attr("AllocationId"),
                    "SubnetId": subnet.reference(),
                    "Tags": [zone_tag],
                }),
                taggable: true,
                depends_on: vec![
                    route.logical_id().to_string(),
                    association.logical_id().to_string(),
                ],
            })?;

            public_subnets.push(subnet);
            nat_gateways.push(nat);
        }

        let mut private_subnets = Vec::with_capacity(self.max_azs);
        for (index, cidr) in private_cidrs.iter().enumerate() {
            let subnet =
                self.declare_subnet(graph, &vpc, SubnetType::PrivateWithEgress, index, cidr)?;
            let prefix = subnet_prefix(&self.id, SubnetType::PrivateWithEgress, index);

            let (table, _) = self.declare_route_table(graph, &vpc, &subnet, &prefix)?;
            graph.add(&NetworkPart {
                id: format!("{prefix}DefaultRoute"),
                kind: "AWS::EC2::Route",
                description: format!("NAT route for private subnet {}", index + 1),
                properties: json!({
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": nat_gateways[index].reference(),
                    "RouteTableId": table.reference(),
                }),
                taggable: false,
                depends_on: Vec::new(),
            })?;

            private_subnets.push(subnet);
        }

        log::info!(
            "declared VPC {} with {} public and {} private subnets",
            self.id,
            public_subnets.len(),
            private_subnets.len()
        );

        Ok(VpcHandles {
            vpc,
            public_subnets,
            private_subnets,
            nat_gateways,
        })
    }

    fn declare_subnet(
        &self,
        graph: &mut ResourceGraph,
        vpc: &Handle,
        subnet_type: SubnetType,
        index: usize,
        cidr: &str,
    ) -> Result<Handle> {
        let label = subnet_type.label();
        graph.add(&NetworkPart {
            id: format!("{}Subnet", subnet_prefix(&self.id, subnet_type, index)),
            kind: "AWS::EC2::Subnet",
            description: format!("{label} subnet {} ({cidr})", index + 1),
            properties: json!({
                "AvailabilityZone": intrinsic::select(index, intrinsic::get_azs()),
                "CidrBlock": cidr,
                "MapPublicIpOnLaunch": subnet_type == SubnetType::Public,
                "Tags": [
                    self.name_tag(&format!("/{label}Subnet{}", index + 1)),
                    { "Key": "SubnetType", "Value": label },
                ],
                "VpcId": vpc.reference(),
            }),
            taggable: true,
            depends_on: Vec::new(),
        })
    }

    fn declare_route_table(
        &self,
        graph: &mut ResourceGraph,
        vpc: &Handle,
        subnet: &Handle,
        prefix: &str,
    ) -> Result<(Handle, Handle)> {
        let table = graph.add(&NetworkPart {
            id: format!("{prefix}RouteTable"),
            kind: "AWS::EC2::RouteTable",
            description: format!("Route table for {}", subnet.logical_id()),
            properties: json!({
                "Tags": [self.name_tag("")],
                "VpcId": vpc.reference(),
            }),
            taggable: true,
            depends_on: Vec::new(),
        })?;
        let association = graph.add(&NetworkPart {
            id: format!("{prefix}RouteTableAssociation"),
            kind: "AWS::EC2::SubnetRouteTableAssociation",
            description: format!("Route table association for {}", subnet.logical_id()),
            properties: json!({
                "RouteTableId": table.reference(),
                "SubnetId": subnet.reference(),
            }),
            taggable: false,
            depends_on: Vec::new(),
        })?;
        Ok((table, association))
    }

    fn name_tag(&self, suffix: &str) -> Value {
        json!({ "Key": "Name", "Value": format!("{}{suffix}", self.name_prefix) })
    }
}

fn subnet_prefix(vpc_id: &str, subnet_type: SubnetType, index: usize) -> String {
    format!("{vpc_id}{}Subnet{}", subnet_type.label(), index + 1)
}

/// Split `cidr` into `count` equal, consecutive blocks
pub fn carve_subnets(resource: &str, cidr: &str, count: usize) -> Result<Vec<String>> {
    let invalid = |reason: String| Error::InvalidProperty {
        resource: resource.to_string(),
        property: "CidrBlock",
        reason,
    };

    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid(format!("'{cidr}' is not in a.b.c.d/n form")))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| invalid(format!("'{addr}' is not an IPv4 address")))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| invalid(format!("'{prefix}' is not a prefix length")))?;
    if !(16..=28).contains(&prefix) {
        return Err(invalid(format!("/{prefix} is outside /16-/28")));
    }

    let bits = count.max(1).next_power_of_two().trailing_zeros();
    let subnet_prefix = prefix + bits;
    if subnet_prefix > 28 {
        return Err(invalid(format!("{cidr} is too small for {count} subnets")));
    }

    let base = u32::from(addr) & (u32::MAX << (32 - prefix));
    let size = 1u32 << (32 - subnet_prefix);
    Ok((0..count as u32)
        .map(|i| format!("{}/{subnet_prefix}", Ipv4Addr::from(base + i * size)))
        .collect())
}

/// Plumbing declaration with no behaviour beyond its properties
#[derive(Debug, Clone)]
struct NetworkPart {
    id: String,
    kind: &'static str,
    description: String,
    properties: Value,
    taggable: bool,
    depends_on: Vec<String>,
}

impl Resource for NetworkPart {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        self.kind
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn properties(&self) -> Value {
        self.properties.clone()
    }

    fn is_taggable(&self) -> bool {
        self.taggable
    }

    fn depends_on(&self) -> Vec<String> {
        self.depends_on.clone()
    }
}
