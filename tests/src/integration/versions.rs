//! # Version Resolution
//!
//! The registry picks the entry with the greatest effective time not after
//! the block, and the selected set decides which opcodes run.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use mirror_evm::config::{VersionEntry, DEFAULT_VERSION_TABLE};
    use mirror_evm::domain::value_objects::{SemanticVersion, Timestamp, U256};
    use mirror_evm::errors::{ConfigError, ExceptionalHaltReason};
    use mirror_evm::evm::{Opcode, VersionRegistry};
    use mirror_evm::ports::inbound::SimulationApi;

    const V34: SemanticVersion = SemanticVersion::new(0, 34, 0);
    const V38: SemanticVersion = SemanticVersion::new(0, 38, 0);
    const V50: SemanticVersion = SemanticVersion::new(0, 50, 0);

    /// PUSH1 0 TLOAD PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
    const TLOAD_RETURN: [u8; 11] = [
        0x60, 0x00, 0x5c, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    fn registry() -> VersionRegistry {
        VersionRegistry::new(&[
            VersionEntry::new(V34, 100),
            VersionEntry::new(V38, 200),
            VersionEntry::new(V50, 300),
        ])
        .unwrap()
    }

    fn at(seconds: i64) -> SemanticVersion {
        registry()
            .resolve(Timestamp::from_seconds(seconds), None)
            .version()
    }

    #[test]
    fn test_resolves_greatest_entry_not_after_block() {
        assert_eq!(at(200), V38);
        assert_eq!(at(201), V38);
        assert_eq!(at(299), V38);
        assert_eq!(at(300), V50);
        assert_eq!(at(i64::MAX), V50);
    }

    #[test]
    fn test_block_before_first_entry_uses_first_entry() {
        assert_eq!(at(50), V34);
        assert_eq!(at(0), V34);
    }

    #[test]
    fn test_registered_hint_wins_over_timestamp() {
        let registry = registry();
        let set = registry.resolve(Timestamp::from_seconds(300), Some(V34));
        assert_eq!(set.version(), V34);

        let unregistered = SemanticVersion::new(0, 30, 0);
        let set = registry.resolve(Timestamp::from_seconds(250), Some(unregistered));
        assert_eq!(set.version(), V38);
    }

    #[test]
    fn test_bad_tables_are_rejected() {
        assert_eq!(
            VersionRegistry::new(&[]).unwrap_err(),
            ConfigError::EmptyVersionTable
        );
        assert_eq!(
            VersionRegistry::new(&[VersionEntry::new(V34, 100), VersionEntry::new(V38, 100)])
                .unwrap_err(),
            ConfigError::UnorderedVersionTable(V38)
        );
        let unknown = SemanticVersion::new(0, 99, 0);
        assert_eq!(
            VersionRegistry::new(&[VersionEntry::new(unknown, 0)]).unwrap_err(),
            ConfigError::UnknownVersion(unknown)
        );
    }

    #[test]
    fn test_default_table_opcode_gates() {
        let registry = VersionRegistry::new(&DEFAULT_VERSION_TABLE).unwrap();
        assert_eq!(registry.len(), DEFAULT_VERSION_TABLE.len());

        let london = registry.resolve(Timestamp::from_seconds(1), None);
        assert!(london.is_enabled(Opcode::BASEFEE));
        assert!(!london.is_enabled(Opcode::PUSH0));

        let shanghai = registry.resolve(Timestamp::from_seconds(1_691_000_000), None);
        assert!(shanghai.is_enabled(Opcode::PUSH0));
        assert!(!shanghai.is_enabled(Opcode::TSTORE));

        let cancun = registry.latest();
        assert!(cancun.is_enabled(Opcode::TSTORE));
        assert!(cancun.is_enabled(Opcode::MCOPY));
    }

    #[tokio::test]
    async fn test_block_time_selects_executable_opcodes() {
        let service = service(snapshot_with(vec![contract(CONTRACT, &TLOAD_RETURN)]));

        let before_cancun = call_to(CONTRACT, Vec::new());
        let result = service.call(before_cancun).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.halt_reason, Some(ExceptionalHaltReason::InvalidOperation));

        let mut after_cancun = call_to(CONTRACT, Vec::new());
        after_cancun.block = block_at(1_716_000_000);
        let result = service.call(after_cancun).await.unwrap();
        assert!(result.success, "{:?}", result.halt_reason);
        assert_eq!(output_word(&result.output), U256::zero());
    }
}
