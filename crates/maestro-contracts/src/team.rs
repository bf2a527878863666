// Team resource - a composition of agents and sub-teams with a strategy

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// Team resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub metadata: ObjectMeta,
    pub spec: TeamSpec,
}

/// Team composition and coordination strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    pub members: Vec<TeamMember>,
    pub strategy: TeamStrategy,
    /// Turn budget for round-robin, graph, and selector strategies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Directed edges over member names, for the graph strategy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graph: Vec<GraphEdge>,
    /// Selector model and prompt, for the selector strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<TeamSelectorSpec>,
}

/// A member of a team: an agent or a nested team
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(rename = "type")]
    pub kind: TeamMemberKind,
    pub name: String,
}

impl TeamMember {
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            kind: TeamMemberKind::Agent,
            name: name.into(),
        }
    }

    pub fn team(name: impl Into<String>) -> Self {
        Self {
            kind: TeamMemberKind::Team,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamMemberKind {
    Agent,
    Team,
}

impl std::fmt::Display for TeamMemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamMemberKind::Agent => write!(f, "agent"),
            TeamMemberKind::Team => write!(f, "team"),
        }
    }
}

/// Coordination strategy for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeamStrategy {
    /// Members run once in declaration order, output feeding forward
    Sequential,
    /// Members iterate in a circle until terminate, max turns, or no progress
    RoundRobin,
    /// Edges route between members; guards select outgoing edges
    Graph,
    /// A selector model names the next member each turn
    Selector,
}

impl std::fmt::Display for TeamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamStrategy::Sequential => write!(f, "sequential"),
            TeamStrategy::RoundRobin => write!(f, "round-robin"),
            TeamStrategy::Graph => write!(f, "graph"),
            TeamStrategy::Selector => write!(f, "selector"),
        }
    }
}

/// Directed edge between two members
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Substring predicate over the last assistant message; an edge without
    /// a guard is followed unconditionally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// Selector model binding for selector-strategy teams
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamSelectorSpec {
    /// Model used to pick the next member; absent means "default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    /// Selection prompt prepended to the running transcript
    pub prompt: String,
}
