// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use pvdeploy_lib::{
        cluster::{Cluster, PlanRequest},
        config::Config,
        descriptor::{mountpoint, Alias, FS_ID},
        nodes::MirrorPeers,
        options::{BackendType, DirType, MirrorMode, Options, Protocol, RoleCounts, Storage},
        test_env::*,
    };

    fn plan(options: Options, config: &Config) -> Cluster {
        let request = PlanRequest {
            pool: numbered_pool(8),
            options,
            counts: RoleCounts::new(3, 1, 1),
            peers: None,
        };
        Cluster::plan(&request, config).unwrap()
    }

    fn alias(node: &str, address: &str) -> Alias {
        Alias {
            node: node.to_string(),
            address: address.to_string(),
        }
    }

    fn with(backend: BackendType, dir: DirType) -> Options {
        Options {
            backend,
            dir,
            ..Default::default()
        }
    }

    const TCP_DESCRIPTOR: &str = r#"<Defaults>
    UnexpectedRequests 50
    EventLogging none
    LogStamp usec
    BMIModules bmi_tcp
    FlowModules flowproto_multiqueue
    PerfUpdateInterval 1000
    ServerJobBMITimeoutSecs 30
    ServerJobFlowTimeoutSecs 30
    ClientJobBMITimeoutSecs 300
    ClientJobFlowTimeoutSecs 300
    ClientRetryLimit 5
    ClientRetryDelayMilliSecs 2000
    StorageSpace /var/lib/pvfs2-storage
    LogFile /tmp/pvfs2.log
</Defaults>

<Aliases>
    Alias n5 tcp://n5:3334
    Alias n6 tcp://n6:3334
    Alias n7 tcp://n7:3334
    Alias n8 tcp://n8:3334
</Aliases>

<Filesystem>
    Name pvfs2-fs
    ID 424242
    <DataHandleRanges>
        Range n5 1000000-1999999
        Range n6 2000000-2999999
        Range n7 3000000-3999999
    </DataHandleRanges>
    <MetaHandleRanges>
        Range n8 4000000-4999999
    </MetaHandleRanges>
    RootHandle 4000000
    <StorageHints>
        TroveSyncMeta no
        TroveSyncData no
        ImmediateCompletion yes
        CoalescingHighWatermark infinity
        CoalescingLowWatermark 1
        TroveMethod dbpf
    </StorageHints>
    FlowBufferSizeBytes 16777216
</Filesystem>
"#;

    #[test]
    fn tcp_descriptor() {
        let config = Config::default();
        let cluster = plan(Options::default(), &config);
        let descriptor = &cluster.descriptor;

        assert_eq!(descriptor.root_handle, 4_000_000);
        assert!(descriptor.servers.is_empty());
        assert_eq!(descriptor.to_string(), TCP_DESCRIPTOR);
        assert_eq!(
            descriptor.tab_entry,
            "tcp://n8:3334/pvfs2-fs /pvfs pvfs2 defaults 0 0"
        );
    }

    #[test]
    fn handle_sections_follow_the_ranges() {
        let config = Config::default();
        let text = plan(with(BackendType::Datafile, DirType::Attr4), &config)
            .descriptor
            .to_string();

        let data = text.find("<DataHandleRanges>").unwrap();
        let meta = text.find("<MetaHandleRanges>").unwrap();
        let root = text.find("RootHandle").unwrap();
        let hints = text.find("<StorageHints>").unwrap();
        assert!(data < meta && meta < root && root < hints);
    }

    #[test]
    fn protocol_addresses() {
        let config = Config::default();
        let ib = plan(
            Options {
                protocol: Protocol::Ib,
                ..Default::default()
            },
            &config,
        );
        assert_eq!(ib.descriptor.aliases[0], alias("n5", "ib://n5:3335"));
        assert_eq!(ib.descriptor.bmi_module, "bmi_ib");
        assert_eq!(
            ib.descriptor.tab_entry,
            "ib://n8:3335/pvfs2-fs /pvfs-ib pvfs2 defaults 0 0"
        );

        let auto = plan(
            Options {
                protocol: Protocol::Auto,
                ..Default::default()
            },
            &config,
        );
        assert_eq!(auto.descriptor.aliases[0], alias("n5", "tcp://n5:3334"));
        assert_eq!(mountpoint(&auto.options), "/pvfs");

        let portals = plan(
            Options {
                protocol: Protocol::Portals,
                ..Default::default()
            },
            &config,
        );
        assert_eq!(portals.descriptor.aliases[0], alias("n5", "portals://n5:3334"));
        assert_eq!(mountpoint(&portals.options), "/pvfs-portals");
    }

    #[test]
    fn osd_nodes_get_object_addresses() {
        let config = Config::default();
        let cluster = plan(with(BackendType::None, DirType::Attr4), &config);

        // n4 hosts directories only; n5..n8 run the filesystem server.
        assert_eq!(
            cluster.descriptor.aliases,
            vec![
                alias("n4", "osd://n4"),
                alias("n5", "tcp://n5:3334"),
                alias("n6", "tcp://n6:3334"),
                alias("n7", "tcp://n7:3334"),
                alias("n8", "tcp://n8:3334"),
            ]
        );

        let text = cluster.descriptor.to_string();
        assert!(text.contains("    OSDDirType attr4\n"));
        assert!(!text.contains("OSDType"));
        assert!(text.contains("    ClientRetryDelayMilliSecs 2000\n    OSDDirType attr4\n"));

        // The root lives on the directory server, so clients reach it as an object store.
        assert_eq!(cluster.handles.root.host, "n4");
        assert_eq!(
            cluster.descriptor.tab_entry,
            "osd://n4/pvfs2-fs /pvfs pvfs2 defaults 0 0"
        );
    }

    #[test]
    fn backend_nodes_get_object_addresses() {
        let config = Config::default();
        let cluster = plan(with(BackendType::Datafile, DirType::Pvfs), &config);
        assert_eq!(
            cluster.descriptor.aliases,
            vec![
                alias("n5", "osd://n5"),
                alias("n6", "osd://n6"),
                alias("n7", "osd://n7"),
                alias("n8", "tcp://n8:3334"),
            ]
        );
        let text = cluster.descriptor.to_string();
        assert!(text.contains("    OSDType datafile\n"));
        assert!(!text.contains("OSDDirType"));

        let mdfile = plan(with(BackendType::Mdfile, DirType::Attr1), &config);
        assert_eq!(
            mdfile.descriptor.aliases,
            vec![
                alias("n6", "osd://n6"),
                alias("n7", "osd://n7"),
                alias("n8", "osd://n8"),
            ]
        );
        let text = mdfile.descriptor.to_string();
        assert!(text.contains("    OSDType mdfile\n    OSDDirType attr1\n"));
    }

    #[test]
    fn mirrors_are_flagged() {
        let config = Config::default();
        assert!(!TCP_DESCRIPTOR.contains("IsMirror"));

        let request = PlanRequest {
            pool: numbered_pool(8),
            options: Options {
                mirror: MirrorMode::DataCache,
                ..Default::default()
            },
            counts: RoleCounts::new(3, 1, 1),
            peers: Some(MirrorPeers {
                meta: vec!["a".to_string()],
                io: vec!["b".to_string()],
            }),
        };
        let cluster = Cluster::plan(&request, &config).unwrap();
        assert!(cluster
            .descriptor
            .to_string()
            .contains("    ID 424242\n    IsMirror 1\n    <DataHandleRanges>\n"));
    }

    #[test]
    fn multi_config_descriptors() {
        let config = Config::default();
        let cluster = plan(
            Options {
                one_config_file: false,
                storage: Storage::Tmpfs,
                rdma: true,
                ..Default::default()
            },
            &config,
        );
        let descriptor = &cluster.descriptor;

        assert!(descriptor.storage.is_none());
        let nodes: Vec<_> = descriptor.servers.iter().map(|s| s.node.as_str()).collect();
        assert_eq!(nodes, ["n5", "n6", "n7", "n8"]);

        let server = &descriptor.servers[0];
        assert_eq!(server.file_name(), "server.conf-n5");
        assert_eq!(
            server.to_string(),
            "StorageSpace /dev/shm/pvfs2-storage\n\
             HostID \"tcp://n5:3334\"\n\
             LogFile /tmp/pvfs2.log\n"
        );

        let text = descriptor.to_string();
        assert!(!text.contains("StorageSpace"));
        assert!(text.contains("    FlowModules flowproto_multiqueue\n"));
    }

    #[test]
    fn render_is_deterministic() {
        let config = Config::default();
        let a = plan(Options::default(), &config);
        let b = plan(Options::default(), &config);
        assert_eq!(a.descriptor, b.descriptor);
        assert_eq!(a.descriptor.fs_id, FS_ID);

        let renamed = Config {
            fs_name: "scratch".to_string(),
            ..Config::default()
        };
        let c = plan(Options::default(), &renamed);
        assert!(c.descriptor.to_string().contains("    Name scratch\n"));
        assert_eq!(c.descriptor.fs_id, FS_ID);
        assert!(c.descriptor.tab_entry.starts_with("tcp://n8:3334/scratch "));
    }
}
