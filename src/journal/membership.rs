//! Group membership administration
//!
//! Wraps the provider's group admin with the candidate address set it
//! queries through: the helper, plus this node when it is electable and
//! distinct from the helper. Rebuilt wholesale when the helper topology
//! changes; membership views are fetched on demand and never cached here.

use std::collections::HashSet;

use crate::provider::{GroupAdmin, GroupMember, ProviderResult};

use super::node::{HostPort, NodeRole};

/// Addresses eligible to answer group queries for this node.
pub fn admin_addresses(
    self_addr: &HostPort,
    helper_addr: &HostPort,
    role: NodeRole,
) -> HashSet<HostPort> {
    let mut addrs = HashSet::new();
    addrs.insert(helper_addr.clone());
    if role.is_electable() && self_addr != helper_addr {
        addrs.insert(self_addr.clone());
    }
    addrs
}

/// Membership admin for the replication group.
#[derive(Debug)]
pub struct MembershipAdmin<A: GroupAdmin> {
    group_name: String,
    addresses: HashSet<HostPort>,
    inner: A,
}

impl<A: GroupAdmin> MembershipAdmin<A> {
    /// Wrap a provider admin with its address set.
    pub fn new(group_name: impl Into<String>, addresses: HashSet<HostPort>, inner: A) -> Self {
        Self {
            group_name: group_name.into(),
            addresses,
            inner,
        }
    }

    /// The replication group name.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// The addresses this admin queries through.
    pub fn addresses(&self) -> &HashSet<HostPort> {
        &self.addresses
    }

    /// The group's current membership view, fetched on demand.
    pub fn members(&self) -> ProviderResult<Vec<GroupMember>> {
        self.inner.members()
    }

    /// The group's current primary.
    pub fn primary(&self) -> ProviderResult<GroupMember> {
        self.inner.primary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;

    #[test]
    fn test_helper_is_always_an_admin_address() {
        let self_addr = HostPort::new("10.0.0.1", 9010);
        let helper = HostPort::new("10.0.0.2", 9010);
        let addrs = admin_addresses(&self_addr, &helper, NodeRole::Observer);
        assert_eq!(addrs.len(), 1);
        assert!(addrs.contains(&helper));
    }

    #[test]
    fn test_electable_self_is_added_when_distinct() {
        let self_addr = HostPort::new("10.0.0.1", 9010);
        let helper = HostPort::new("10.0.0.2", 9010);
        let addrs = admin_addresses(&self_addr, &helper, NodeRole::Electable);
        assert_eq!(addrs.len(), 2);
        assert!(addrs.contains(&self_addr));
        assert!(addrs.contains(&helper));
    }

    #[test]
    fn test_self_equal_to_helper_is_not_duplicated() {
        let addr = HostPort::new("10.0.0.1", 9010);
        let addrs = admin_addresses(&addr, &addr, NodeRole::Electable);
        assert_eq!(addrs.len(), 1);
    }

    struct FixedAdmin {
        members: Vec<GroupMember>,
    }

    impl GroupAdmin for FixedAdmin {
        fn members(&self) -> ProviderResult<Vec<GroupMember>> {
            Ok(self.members.clone())
        }

        fn primary(&self) -> ProviderResult<GroupMember> {
            self.members
                .first()
                .cloned()
                .ok_or_else(|| ProviderError::NoPrimary("empty group".into()))
        }
    }

    #[test]
    fn test_queries_delegate_to_provider_admin() {
        let member = GroupMember {
            name: "fe-1".into(),
            addr: HostPort::new("10.0.0.1", 9010),
        };
        let admin = MembershipAdmin::new(
            "TEST_GROUP",
            HashSet::new(),
            FixedAdmin {
                members: vec![member.clone()],
            },
        );

        assert_eq!(admin.group_name(), "TEST_GROUP");
        assert_eq!(admin.members().unwrap(), vec![member.clone()]);
        assert_eq!(admin.primary().unwrap(), member);
    }

    #[test]
    fn test_empty_group_has_no_primary() {
        let admin = MembershipAdmin::new(
            "TEST_GROUP",
            HashSet::new(),
            FixedAdmin { members: vec![] },
        );
        assert!(admin.primary().is_err());
    }
}
