// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use pvdeploy_lib::{
        error::{PlanError, Result},
        handles::{self, HandleAssignment, HandleRange},
        nodes::{extract_tail, MirrorPeers, NodePool},
        options::{BackendType, DirType, MirrorMode, Options, RoleCounts},
        test_env::*,
        topology::{self, Role, Topology},
    };

    fn plan(
        pool: &NodePool,
        options: &Options,
        counts: RoleCounts,
        peers: Option<&MirrorPeers>,
    ) -> Result<(Topology, HandleAssignment)> {
        let topology = topology::resolve(pool, options, counts, peers)?;
        let handles = handles::allocate(&topology, options, peers)?;
        Ok((topology, handles))
    }

    fn range(start: u64, end: u64) -> HandleRange {
        HandleRange { start, end }
    }

    fn table(rows: &[(&str, u64, u64)]) -> Vec<(String, HandleRange)> {
        rows.iter()
            .map(|&(node, start, end)| (node.to_string(), range(start, end)))
            .collect()
    }

    fn with(backend: BackendType, dir: DirType) -> Options {
        Options {
            backend,
            dir,
            ..Default::default()
        }
    }

    #[test]
    fn eight_node_pvfs_layout() {
        let (topology, handles) = plan(
            &numbered_pool(8),
            &Options::default(),
            RoleCounts::new(3, 1, 1),
            None,
        )
        .unwrap();

        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3", "n4"]);
        assert_eq!(topology.members(Role::Pvfs), ["n5", "n6", "n7", "n8"]);
        assert_eq!(topology.members(Role::Io), ["n5", "n6", "n7"]);
        assert_eq!(topology.members(Role::Meta), ["n8"]);
        assert!(topology.members(Role::Backend).is_empty());
        assert!(topology.members(Role::Directory).is_empty());

        assert_eq!(
            handles.data,
            table(&[
                ("n5", 1_000_000, 1_999_999),
                ("n6", 2_000_000, 2_999_999),
                ("n7", 3_000_000, 3_999_999),
            ])
        );
        assert_eq!(handles.meta, table(&[("n8", 4_000_000, 4_999_999)]));
        assert_eq!(handles.root.value, 4_000_000);
        assert_eq!(handles.root.host, "n8");
    }

    #[test]
    fn mdfile_forces_full_overlap() {
        let options = with(BackendType::Mdfile, DirType::Pvfs);
        let counts = RoleCounts::new(2, 1, 1).normalize(&options).unwrap();
        assert_eq!(counts.num_meta, 2);

        let (topology, handles) =
            plan(&numbered_pool(8), &options, RoleCounts::new(2, 1, 1), None).unwrap();

        assert_eq!(topology.members(Role::Backend), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Io), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Meta), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Pvfs), ["n7", "n8"]);
        assert_eq!(
            topology.members(Role::Compute),
            ["n1", "n2", "n3", "n4", "n5", "n6"]
        );

        assert_eq!(
            handles.meta,
            table(&[("n7", 3_000_000, 3_999_999), ("n8", 4_000_000, 4_999_999)])
        );
        assert_eq!(handles.root.host, "n7");
        assert_eq!(handles.root.value, 3_000_000);
    }

    #[test]
    fn whole_pool_as_servers() {
        let nodes: Vec<String> = (1..=5).map(|i| format!("n{i}")).collect();
        let (head, tail) = extract_tail(&nodes, 5).unwrap();
        assert!(head.is_empty());
        assert_eq!(tail, nodes.as_slice());

        let (topology, _) = plan(
            &numbered_pool(5),
            &Options::default(),
            RoleCounts::new(4, 1, 1),
            None,
        )
        .unwrap();
        assert!(topology.members(Role::Compute).is_empty());
        assert_eq!(topology.members(Role::Pvfs).len(), 5);
    }

    #[test]
    fn insufficient_nodes() {
        let err = plan(
            &numbered_pool(3),
            &Options::default(),
            RoleCounts::new(3, 1, 1),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InsufficientNodes {
                requested: 4,
                available: 3
            }
        ));

        // Directory, I/O and metadata servers come out of a single tail.
        let err = plan(
            &numbered_pool(4),
            &with(BackendType::None, DirType::Attr4),
            RoleCounts::new(3, 1, 1),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InsufficientNodes {
                requested: 5,
                available: 4
            }
        ));
    }

    #[test]
    fn inconsistent_options() {
        let options = Options {
            meta_on_io: true,
            ..with(BackendType::Datafile, DirType::Pvfs)
        };
        let err = plan(&numbered_pool(8), &options, RoleCounts::new(2, 1, 1), None).unwrap_err();
        assert!(matches!(err, PlanError::InconsistentOptions(_)));

        let options = Options {
            meta_on_io: true,
            ..Default::default()
        };
        let err = plan(&numbered_pool(8), &options, RoleCounts::new(2, 3, 1), None).unwrap_err();
        assert!(matches!(err, PlanError::InconsistentOptions(_)));

        let options = Options {
            meta_on_io: true,
            mirror: MirrorMode::MetaMirror,
            ..Default::default()
        };
        let err = plan(&numbered_pool(8), &options, RoleCounts::new(2, 1, 1), None).unwrap_err();
        assert!(matches!(err, PlanError::InconsistentOptions(_)));
    }

    #[test]
    fn no_meta_nodes_means_no_root() {
        let err = plan(
            &numbered_pool(8),
            &Options::default(),
            RoleCounts::new(2, 0, 1),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::NoRootCandidate));
    }

    #[test]
    fn meta_packed_on_io() {
        let options = Options {
            meta_on_io: true,
            ..Default::default()
        };
        let (topology, handles) =
            plan(&numbered_pool(6), &options, RoleCounts::new(3, 2, 1), None).unwrap();

        assert_eq!(topology.members(Role::Io), ["n4", "n5", "n6"]);
        assert_eq!(topology.members(Role::Meta), ["n4", "n5"]);
        assert_eq!(topology.members(Role::Pvfs), ["n4", "n5", "n6"]);
        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3"]);

        // Packed nodes still get separate data and metadata ranges.
        assert_eq!(handles.data_range("n4"), Some(range(1_000_000, 1_999_999)));
        assert_eq!(handles.meta_range("n4"), Some(range(4_000_000, 4_999_999)));
        assert_eq!(handles.root.host, "n4");
    }

    #[test]
    fn pvfs_datafile_layout() {
        let (topology, handles) = plan(
            &numbered_pool(8),
            &with(BackendType::Datafile, DirType::Pvfs),
            RoleCounts::new(2, 1, 1),
            None,
        )
        .unwrap();

        // The backend takes the low end of the server tail, the pvfs servers sit above it.
        assert_eq!(topology.members(Role::Backend), ["n6", "n7"]);
        assert_eq!(topology.members(Role::Io), ["n6", "n7"]);
        assert_eq!(topology.members(Role::Meta), ["n8"]);
        assert_eq!(topology.members(Role::Pvfs), ["n8"]);
        assert_eq!(
            topology.members(Role::Compute),
            ["n1", "n2", "n3", "n4", "n5"]
        );
        assert_eq!(handles.root.host, "n8");
        assert_eq!(handles.root.value, 3_000_000);
    }

    #[test]
    fn pvfs_metafile_layout() {
        let (topology, handles) = plan(
            &numbered_pool(8),
            &with(BackendType::Metafile, DirType::Pvfs),
            RoleCounts::new(2, 1, 1),
            None,
        )
        .unwrap();

        assert_eq!(topology.members(Role::Backend), ["n5", "n6", "n7"]);
        assert_eq!(topology.members(Role::Io), ["n5", "n6"]);
        assert_eq!(topology.members(Role::Meta), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Pvfs), ["n8"]);
        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3", "n4"]);

        // Only the pvfs-hosted metadata node may hold the root.
        assert_eq!(
            handles.meta,
            table(&[("n7", 3_000_000, 3_999_999), ("n8", 4_000_000, 4_999_999)])
        );
        assert_eq!(handles.root.host, "n8");
        assert_eq!(handles.root.value, 4_000_000);
    }

    #[test]
    fn osd_directory_sits_below_pvfs_servers() {
        let (topology, handles) = plan(
            &numbered_pool(8),
            &with(BackendType::None, DirType::Attr4),
            RoleCounts::new(3, 1, 1),
            None,
        )
        .unwrap();

        assert_eq!(topology.members(Role::Directory), ["n4"]);
        assert_eq!(topology.members(Role::Io), ["n6", "n7", "n8"]);
        assert_eq!(topology.members(Role::Meta), ["n4", "n5"]);
        assert_eq!(topology.members(Role::Pvfs), ["n5", "n6", "n7", "n8"]);
        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3"]);

        assert_eq!(
            handles.data,
            table(&[
                ("n6", 1_000_000, 1_999_999),
                ("n7", 2_000_000, 2_999_999),
                ("n8", 3_000_000, 3_999_999),
            ])
        );
        assert_eq!(
            handles.meta,
            table(&[("n4", 4_000_000, 4_999_999), ("n5", 5_000_000, 5_999_999)])
        );
        assert_eq!(handles.root.host, "n4");
        assert_eq!(handles.root.value, 4_000_000);
    }

    #[test]
    fn osd_datafile_layout() {
        let (topology, handles) = plan(
            &numbered_pool(8),
            &with(BackendType::Datafile, DirType::Attr4),
            RoleCounts::new(2, 1, 1),
            None,
        )
        .unwrap();

        // Backend lowest, then the directory, then the pvfs servers.
        assert_eq!(topology.members(Role::Backend), ["n5", "n6"]);
        assert_eq!(topology.members(Role::Io), ["n5", "n6"]);
        assert_eq!(topology.members(Role::Directory), ["n7"]);
        assert_eq!(topology.members(Role::Pvfs), ["n8"]);
        assert_eq!(topology.members(Role::Meta), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3", "n4"]);
        assert_eq!(handles.root.host, "n7");
        assert_eq!(handles.root.value, 3_000_000);
    }

    #[test]
    fn osd_metafile_layout_has_no_pvfs_servers() {
        let options = with(BackendType::Metafile, DirType::Obj);
        let counts = RoleCounts::new(2, 1, 2).normalize(&options).unwrap();
        assert_eq!(counts.num_dir, 1);

        let (topology, handles) =
            plan(&numbered_pool(8), &options, RoleCounts::new(2, 1, 2), None).unwrap();

        // The metadata part of the backend hosts the directory.
        assert_eq!(topology.members(Role::Backend), ["n6", "n7", "n8"]);
        assert_eq!(topology.members(Role::Io), ["n6", "n7"]);
        assert_eq!(topology.members(Role::Meta), ["n8"]);
        assert_eq!(topology.members(Role::Directory), ["n8"]);
        assert!(topology.members(Role::Pvfs).is_empty());
        assert_eq!(
            topology.members(Role::Compute),
            ["n1", "n2", "n3", "n4", "n5"]
        );
        assert_eq!(handles.root.host, "n8");
    }

    #[test]
    fn osd_mdfile_layout_has_no_pvfs_servers() {
        let (topology, handles) = plan(
            &numbered_pool(6),
            &with(BackendType::Mdfile, DirType::Attr1),
            RoleCounts::new(2, 1, 1),
            None,
        )
        .unwrap();

        for role in [Role::Backend, Role::Directory, Role::Io, Role::Meta] {
            assert_eq!(topology.members(role), ["n5", "n6"], "{role}");
        }
        assert!(topology.members(Role::Pvfs).is_empty());
        assert_eq!(topology.members(Role::Compute), ["n1", "n2", "n3", "n4"]);
        assert_eq!(handles.root.host, "n5");
    }

    /// Every valid layout keeps clients and servers apart, gives non-overlapping ranges and roots
    /// the filesystem on a metadata node at the start of its range.
    #[test]
    fn layout_invariants() {
        let pool = numbered_pool(12);
        let dirs = [DirType::Pvfs, DirType::Attr4, DirType::Obj];
        let backends = [
            BackendType::None,
            BackendType::Datafile,
            BackendType::Metafile,
            BackendType::Mdfile,
        ];

        let mut planned = 0;
        for dir in dirs {
            for backend in backends {
                for meta_on_io in [false, true] {
                    if meta_on_io && backend != BackendType::None {
                        continue;
                    }
                    let options = Options {
                        meta_on_io,
                        ..with(backend, dir)
                    };
                    for num_io in 1..=3 {
                        for num_meta in 1..=3 {
                            for num_dir in 1..=2 {
                                let counts = RoleCounts::new(num_io, num_meta, num_dir);
                                if meta_on_io && num_meta > num_io {
                                    continue;
                                }
                                let (topology, handles) =
                                    plan(&pool, &options, counts, None).unwrap();
                                check_invariants(&topology, &handles, backend);
                                planned += 1;
                            }
                        }
                    }
                }
            }
        }
        assert!(planned > 100);
    }

    fn check_invariants(topology: &Topology, handles: &HandleAssignment, backend: BackendType) {
        for &c in topology.indices(Role::Compute) {
            assert!(!topology.is_server(c), "{} is both client and server", topology.name(c));
        }
        assert_eq!(
            topology.indices(Role::Compute).len() + topology.servers().len(),
            topology.pool_len()
        );

        let all: Vec<_> = handles.data.iter().chain(handles.meta.iter()).collect();
        for (i, (a, ra)) in all.iter().enumerate() {
            assert!(ra.start <= ra.end);
            for (b, rb) in &all[i + 1..] {
                assert!(!ra.overlaps(rb), "{a} {ra} overlaps {b} {rb}");
            }
        }

        let root = &handles.root;
        assert!(topology.members(Role::Meta).contains(&root.host.as_str()));
        assert_eq!(handles.meta_range(&root.host).map(|r| r.start), Some(root.value));

        if backend == BackendType::Mdfile {
            assert_eq!(topology.members(Role::Io), topology.members(Role::Meta));
            assert_eq!(topology.members(Role::Io), topology.members(Role::Backend));
        }
    }

    #[test]
    fn remote_mount_replaces_io_and_meta() {
        let options = Options {
            mirror: MirrorMode::RemoteMount,
            ..Default::default()
        };
        let peers = MirrorPeers {
            meta: vec!["r1".to_string()],
            io: vec!["r2".to_string(), "r3".to_string()],
        };
        let (topology, handles) = plan(
            &numbered_pool(8),
            &options,
            RoleCounts::new(2, 1, 1),
            Some(&peers),
        )
        .unwrap();

        assert_eq!(topology.members(Role::Io), ["r2", "r3"]);
        assert_eq!(topology.members(Role::Meta), ["r1"]);
        assert_eq!(topology.members(Role::Pvfs), ["r2", "r3", "r1"]);
        assert_eq!(topology.remote_nodes(), ["r2", "r3", "r1"]);
        assert_eq!(topology.members(Role::Compute).len(), 8);
        assert!(topology.local_members(Role::Pvfs).is_empty());

        assert_eq!(
            handles.data,
            table(&[("r2", 1_000_000, 1_999_999), ("r3", 2_000_000, 2_999_999)])
        );
        assert_eq!(handles.root.host, "r1");
        assert_eq!(handles.root.value, 3_000_000);
    }

    #[test]
    fn meta_mirror_keeps_directory_hosts() {
        let options = Options {
            mirror: MirrorMode::MetaMirror,
            ..with(BackendType::None, DirType::Attr4)
        };
        let peers = MirrorPeers {
            meta: vec!["m1".to_string(), "m2".to_string()],
            io: vec!["x1".to_string(), "x2".to_string(), "x3".to_string()],
        };
        let (topology, handles) = plan(
            &numbered_pool(8),
            &options,
            RoleCounts::new(2, 1, 1),
            Some(&peers),
        )
        .unwrap();

        assert_eq!(topology.members(Role::Meta), ["n5", "m1", "m2"]);
        assert_eq!(topology.members(Role::Io), ["n7", "n8"]);
        assert_eq!(topology.members(Role::Pvfs), ["n7", "n8", "m1", "m2"]);
        assert_eq!(
            topology.members(Role::Compute),
            ["n1", "n2", "n3", "n4", "n6"]
        );

        // Three metadata nodes share two peers' worth of handles.
        assert_eq!(
            handles.meta,
            table(&[
                ("n5", 3_000_000, 3_666_665),
                ("m1", 3_666_666, 4_333_331),
                ("m2", 4_333_332, 4_999_999),
            ])
        );
        assert_eq!(handles.root.host, "n5");
    }

    #[test]
    fn data_cache_rescales_without_moving_nodes() {
        let options = Options {
            mirror: MirrorMode::DataCache,
            ..Default::default()
        };
        let peers = MirrorPeers {
            meta: vec!["a".to_string(), "b".to_string()],
            io: vec!["c".to_string(), "d".to_string()],
        };
        let pool = numbered_pool(8);
        let counts = RoleCounts::new(3, 1, 1);
        let (topology, handles) = plan(&pool, &options, counts, Some(&peers)).unwrap();
        let (plain, _) = plan(&pool, &Options::default(), counts, None).unwrap();

        assert_eq!(topology, plain);
        assert_eq!(
            handles.data,
            table(&[
                ("n5", 1_000_000, 1_666_665),
                ("n6", 1_666_666, 2_333_331),
                ("n7", 2_333_332, 2_999_999),
            ])
        );
        assert_eq!(handles.meta, table(&[("n8", 3_000_000, 4_999_999)]));
        assert_eq!(handles.root.value, 3_000_000);
    }

    #[test]
    fn mirror_errors() {
        let pool = numbered_pool(8);
        let counts = RoleCounts::new(2, 1, 1);
        let options = Options {
            mirror: MirrorMode::RemoteMount,
            ..Default::default()
        };

        let err = plan(&pool, &options, counts, None).unwrap_err();
        assert!(matches!(err, PlanError::InconsistentOptions(_)));

        let peers = MirrorPeers {
            meta: vec!["r1".to_string()],
            io: Vec::new(),
        };
        let err = plan(&pool, &options, counts, Some(&peers)).unwrap_err();
        assert!(matches!(err, PlanError::EmptyMirrorList("io")));

        let env = TestEnvironment::new("mirror_errors");
        let meta = env.write_nodes("meta", &["r1"]);
        let err = MirrorPeers::from_files(&meta, &env.path("missing")).unwrap_err();
        assert!(matches!(err, PlanError::MissingMirrorFile { .. }));
    }

    #[test]
    fn node_file_skips_blanks_and_comments() {
        let env = TestEnvironment::new("node_file");
        let path = env.write_nodes("pool", &["# rack 1", "n1", "", "  n2  ", "n3"]);
        let pool = NodePool::from_file(&path).unwrap();
        assert_eq!(pool.nodes(), ["n1", "n2", "n3"]);

        let err = NodePool::from_file(&env.path("absent")).unwrap_err();
        assert!(matches!(err, PlanError::NodeList { .. }));
    }
}
