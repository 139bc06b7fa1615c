// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::Path;

use crate::error::{PlanError, Result};

/// The ordered list of machines a deployment may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePool {
    nodes: Vec<String>,
}

impl NodePool {
    pub fn new<S: Into<String>>(nodes: impl IntoIterator<Item = S>) -> Self {
        NodePool {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }

    /// Load the pool from a node-list file.
    pub fn from_file(path: &str) -> Result<Self> {
        let nodes = read_node_file(path).map_err(|source| PlanError::NodeList {
            path: path.to_string(),
            source,
        })?;
        Ok(NodePool { nodes })
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Split `nodes` into a head and a tail of `n` elements. The tail holds the highest-indexed
/// nodes, which become servers; the head stays available for clients or further extraction.
///
/// Taking every node is allowed: the head is simply empty.
pub fn extract_tail<T>(nodes: &[T], n: usize) -> Result<(&[T], &[T])> {
    if n > nodes.len() {
        return Err(PlanError::InsufficientNodes {
            requested: n,
            available: nodes.len(),
        });
    }
    Ok(nodes.split_at(nodes.len() - n))
}

/// Read a newline-delimited list of hostnames, preserving order. Blank lines and lines starting
/// with '#' are skipped.
pub fn read_node_file(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_node_list(&contents))
}

pub fn parse_node_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Node lists read from the two files given with a mirror flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorPeers {
    pub meta: Vec<String>,
    pub io: Vec<String>,
}

impl MirrorPeers {
    pub fn from_files(meta_path: &str, io_path: &str) -> Result<Self> {
        let read = |path: &str| {
            read_node_file(path).map_err(|source| PlanError::MissingMirrorFile {
                path: path.to_string(),
                source,
            })
        };
        Ok(MirrorPeers {
            meta: read(meta_path)?,
            io: read(io_path)?,
        })
    }
}
