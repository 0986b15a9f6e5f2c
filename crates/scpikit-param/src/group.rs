use std::collections::HashMap;

use scpikit_transport::{ScpiSession, SessionHandle};
use scpikit_wire::Value;

use crate::block::BlockParameter;
use crate::error::{ParamError, Result};
use crate::scalar::{decode_reading, Parameter};

/// The ellipsis node marking where sub-nodes splice into a reading root.
const WILDCARD: &str = ":...";

/// A parameter registered in a [`ParameterGroup`] — scalar or block,
/// detected from the wire name at registration.
pub enum GroupMember {
    Scalar(Parameter),
    Block(BlockParameter),
}

impl GroupMember {
    fn store(&mut self) -> Result<()> {
        match self {
            GroupMember::Scalar(p) => p.store(),
            GroupMember::Block(p) => p.store(),
        }
    }

    fn restore(&mut self) -> Result<()> {
        match self {
            GroupMember::Scalar(p) => p.restore(),
            GroupMember::Block(p) => p.restore(),
        }
    }
}

/// An aggregation of parameters under unique keys with bulk store/restore.
///
/// Restore iterates in registration order — callers with interdependent
/// settings register them in the order they must be written back.
pub struct ParameterGroup {
    session: SessionHandle,
    description: String,
    entries: Vec<(String, GroupMember)>,
}

impl ParameterGroup {
    /// Create an empty group. `description` names the group in error
    /// messages.
    pub fn new(session: SessionHandle, description: &str) -> Self {
        Self {
            session,
            description: description.to_string(),
            entries: Vec::new(),
        }
    }

    /// The group description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register a parameter under `key`. Wire names ending in the
    /// whole-block marker node register as block parameters, everything
    /// else as scalars.
    pub fn add(&mut self, key: &str, wire_name: &str) -> Result<()> {
        self.add_with_ack(key, wire_name, false)
    }

    /// Like [`add`](ParameterGroup::add) with acknowledged writes.
    pub fn add_with_ack(&mut self, key: &str, wire_name: &str, ack: bool) -> Result<()> {
        if self.entries.iter().any(|(k, _)| k == key) {
            return Err(ParamError::DuplicateName {
                group: self.description.clone(),
                name: key.to_string(),
            });
        }
        let member = if is_block_name(wire_name) {
            let block = if ack {
                BlockParameter::with_ack(self.session.clone(), wire_name)
            } else {
                BlockParameter::new(self.session.clone(), wire_name)
            };
            GroupMember::Block(block)
        } else {
            let scalar = if ack {
                Parameter::with_ack(self.session.clone(), wire_name)
            } else {
                Parameter::new(self.session.clone(), wire_name)
            };
            GroupMember::Scalar(scalar)
        };
        self.entries.push((key.to_string(), member));
        Ok(())
    }

    /// Snapshot every member, in registration order.
    pub fn store(&mut self) -> Result<()> {
        for (_, member) in &mut self.entries {
            member.store()?;
        }
        Ok(())
    }

    /// Write every snapshot back, first registered first.
    pub fn restore(&mut self) -> Result<()> {
        for (_, member) in &mut self.entries {
            member.restore()?;
        }
        Ok(())
    }

    /// The registered member under `key`.
    pub fn member(&mut self, key: &str) -> Option<&mut GroupMember> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, m)| m)
    }

    /// The scalar parameter under `key`, if that key holds one.
    pub fn parameter(&mut self, key: &str) -> Option<&mut Parameter> {
        match self.member(key) {
            Some(GroupMember::Scalar(p)) => Some(p),
            _ => None,
        }
    }

    /// The block parameter under `key`, if that key holds one.
    pub fn block(&mut self, key: &str) -> Option<&mut BlockParameter> {
        match self.member(key) {
            Some(GroupMember::Block(p)) => Some(p),
            _ => None,
        }
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_block_name(wire_name: &str) -> bool {
    let lower = wire_name.trim_end_matches('?').to_ascii_lowercase();
    lower.len() > 5 && lower.ends_with(":bloc")
}

/// A sub-node spec for [`ReadingGroup::add_readings`]: either a bare node
/// (the node text doubles as the key) or an explicitly keyed node.
pub struct ReadingNode {
    key: Option<String>,
    node: String,
}

impl ReadingNode {
    /// A bare node; the node text is used as the result key.
    pub fn node(node: &str) -> Self {
        Self {
            key: None,
            node: node.to_string(),
        }
    }

    /// A node stored under an explicit key.
    pub fn named(key: &str, node: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            node: node.to_string(),
        }
    }
}

impl From<&str> for ReadingNode {
    fn from(node: &str) -> Self {
        ReadingNode::node(node)
    }
}

impl From<(&str, &str)> for ReadingNode {
    fn from((key, node): (&str, &str)) -> Self {
        ReadingNode::named(key, node)
    }
}

/// A group of scalar readings fetched in one compound round trip.
///
/// Registered queries are batched into a single `;`-joined command; `get`
/// splits the reply back into one decoded slot per registered key.
pub struct ReadingGroup {
    session: SessionHandle,
    description: String,
    entries: Vec<(String, String)>,
    cmd: String,
}

impl ReadingGroup {
    /// Create an empty group. `description` names the group in error
    /// messages.
    pub fn new(session: SessionHandle, description: &str) -> Self {
        Self {
            session,
            description: description.to_string(),
            entries: Vec::new(),
            cmd: String::new(),
        }
    }

    /// The group description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Registration order of the result keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Register readings under a common root.
    ///
    /// `root` may carry one `:...` placeholder naming where each node
    /// splices in; with no placeholder (or a trailing one) nodes are
    /// appended. More than one placeholder fails with
    /// `UnsupportedWildcard`; reused keys fail with `DuplicateName`.
    pub fn add_readings<I, N>(&mut self, root: &str, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = N>,
        N: Into<ReadingNode>,
    {
        let components = self.root_components(root)?;
        for node in nodes {
            let node = node.into();
            let key = node.key.as_deref().unwrap_or(&node.node).to_string();
            if self.entries.iter().any(|(k, _)| *k == key) {
                return Err(ParamError::DuplicateName {
                    group: self.description.clone(),
                    name: key,
                });
            }
            let query = build_query(&components, &node.node);
            if !self.cmd.is_empty() {
                self.cmd.push(';');
            }
            self.cmd.push_str(&query);
            self.entries.push((key, query));
        }
        Ok(())
    }

    /// Fetch all registered readings in one round trip.
    ///
    /// Returns one slot per key; invalid readings decode to `None`.
    pub fn get(&mut self) -> Result<HashMap<String, Option<Value>>> {
        if self.cmd.is_empty() {
            return Err(ParamError::NothingRegistered(self.description.clone()));
        }
        let response = self.session.borrow_mut().query_text(&self.cmd)?;
        let slots: Vec<&str> = response.split(';').collect();
        if slots.len() != self.entries.len() {
            return Err(ParamError::MalformedReading {
                name: self.description.clone(),
                response,
            });
        }

        let mut results = HashMap::with_capacity(self.entries.len());
        for ((key, query), slot) in self.entries.iter().zip(&slots) {
            let value = decode_reading(slot, query)?;
            results.insert(key.clone(), value);
        }
        Ok(results)
    }

    fn root_components(&self, root: &str) -> Result<Vec<String>> {
        let root_trimmed = root.strip_suffix('?').unwrap_or(root);
        let mut components: Vec<String> =
            root_trimmed.split(WILDCARD).map(str::to_string).collect();
        if components.len() == 2 && components[1].is_empty() {
            components.truncate(1);
        }
        if components.len() > 2 {
            return Err(ParamError::UnsupportedWildcard {
                group: self.description.clone(),
                root: root.to_string(),
            });
        }
        Ok(components)
    }
}

fn build_query(components: &[String], node: &str) -> String {
    let node = node.strip_suffix('?').unwrap_or(node);
    let node = node.strip_suffix(':').unwrap_or(node);
    let node = node.strip_prefix(':').unwrap_or(node);

    let query = match components {
        [head] => format!("{head}:{node}?"),
        [head, tail] => format!("{head}:{node}:{tail}?"),
        _ => unreachable!("root_components yields one or two components"),
    };
    query.replace("::", ":")
}
