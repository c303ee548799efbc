//! # Simulation Service
//!
//! Async facade over the interpreter. Each request is resolved to an EVM
//! version, executed on a blocking thread against a fresh world-state view,
//! and bounded by the configured deadline.
//!
//! ## Isolation
//!
//! - Every call gets its own [`WorldStateView`], updater stack and entity
//!   sequencer, so concurrent calls share nothing mutable but the caches.
//! - Nothing a call writes outlives it.
//! - On deadline the cancel flag is raised; the interpreter stops at the
//!   next opcode boundary and its state is discarded.

use crate::adapters::cached::CachedSnapshot;
use crate::adapters::in_memory::InMemorySnapshot;
use crate::adapters::pricing::{InMemoryBlockHashes, StaticExchangeRates, StaticFeeSchedule};
use crate::config::EvmProperties;
use crate::domain::entities::{ExecutionContext, ExecutionResult, TraceOptions, VmConfig};
use crate::domain::transactions::Functionality;
use crate::domain::value_objects::Timestamp;
use crate::errors::{ConfigError, StateError, VmError};
use crate::evm::interpreter::{Environment, Interpreter};
use crate::evm::prng::RunningHashSeed;
use crate::evm::tracer::StepTracer;
use crate::evm::{LedgerGasCalculator, VersionRegistry, VersionedOperationSet};
use crate::metrics;
use crate::ports::inbound::{CallRequest, SimulationApi};
use crate::ports::outbound::{
    BlockHashOracle, HbarCentExchange, SnapshotProvider, UsagePricesProvider,
};
use crate::precompile::{PrecompilePricing, TokenPrecompileDispatcher};
use crate::pricing::{ExchangeRate, FeeData, PricesSource};
use crate::state::{SimulatedSequencer, WorldStateView};
use crate::usage::UsageBasedFeeCalculator;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// First entity number handed to contracts created by a simulation.
pub const FIRST_SIMULATED_ENTITY_NUM: u64 = 1_000_000_000;

/// Statistics for the simulation service.
#[derive(Debug, Default, Clone)]
pub struct ServiceStats {
    /// Calls executed, including `estimate_gas` probes.
    pub calls_executed: u64,
    /// Calls that completed successfully.
    pub successful_calls: u64,
    /// Calls that reverted or halted.
    pub failed_calls: u64,
    /// Calls aborted by the deadline.
    pub timeouts: u64,
    /// Requests refused before execution.
    pub rejected_requests: u64,
    /// Total gas consumed.
    pub total_gas_used: u64,
}

/// Outbound collaborators of the service.
pub struct ServiceDependencies {
    /// Ledger state at the simulated block.
    pub snapshot: Arc<dyn SnapshotProvider>,
    /// Fee schedules.
    pub usage_prices: Arc<dyn UsagePricesProvider>,
    /// Exchange rates.
    pub exchange: Arc<dyn HbarCentExchange>,
    /// BLOCKHASH source.
    pub block_hashes: Arc<dyn BlockHashOracle>,
}

/// Read-only parts shared by every call.
struct Engine {
    snapshot: Arc<dyn SnapshotProvider>,
    gas_calculator: LedgerGasCalculator,
    token_service: TokenPrecompileDispatcher,
    block_hashes: Arc<dyn BlockHashOracle>,
    prng: RunningHashSeed,
    vm_config: VmConfig,
    redirect_token_calls: bool,
}

impl Engine {
    fn run(
        &self,
        operations: &VersionedOperationSet,
        ctx: ExecutionContext,
        is_create: bool,
        tracer: StepTracer,
        cancel: &AtomicBool,
        timeout_ms: u64,
    ) -> Result<ExecutionResult, VmError> {
        let view = WorldStateView::new(
            Arc::clone(&self.snapshot),
            Arc::new(SimulatedSequencer::new(FIRST_SIMULATED_ENTITY_NUM)),
            self.redirect_token_calls,
            ctx.block.timestamp,
        );
        let env = Environment {
            operations,
            gas_calculator: &self.gas_calculator,
            token_service: &self.token_service,
            block_hashes: self.block_hashes.as_ref(),
            prng: &self.prng,
            config: &self.vm_config,
            cancel,
            timeout_ms,
        };
        Interpreter::new(env, tracer).transact(ctx, is_create, &view)
    }
}

/// The simulation service.
///
/// This service:
/// 1. Validates the request against the engine limits
/// 2. Resolves the EVM version for the block
/// 3. Executes the call on a blocking thread under a deadline
/// 4. Maintains execution statistics
pub struct SimulationService {
    properties: EvmProperties,
    registry: Arc<VersionRegistry>,
    engine: Arc<Engine>,
    stats: Arc<RwLock<ServiceStats>>,
}

impl SimulationService {
    /// Builds the service. The snapshot is wrapped in read-through caches
    /// sized by `properties.cache`.
    ///
    /// # Errors
    ///
    /// `ConfigError` when the version table is rejected.
    pub fn new(
        properties: EvmProperties,
        deps: ServiceDependencies,
    ) -> Result<Self, ConfigError> {
        let registry = Arc::new(VersionRegistry::new(&properties.evm_versions)?);
        let snapshot: Arc<dyn SnapshotProvider> = Arc::new(CachedSnapshot::new(
            deps.snapshot,
            properties.cache.entity,
            properties.cache.token,
        ));
        let prices = Arc::new(PricesSource::new(
            Arc::clone(&deps.usage_prices),
            Arc::clone(&deps.exchange),
        ));
        let fees = Arc::new(UsageBasedFeeCalculator::with_default_estimators(
            deps.usage_prices,
            deps.exchange,
        ));
        let vm_config = VmConfig {
            max_call_depth: properties.max_call_depth,
            ..VmConfig::default()
        };
        let engine = Engine {
            snapshot,
            gas_calculator: LedgerGasCalculator::new(Arc::clone(&prices)),
            token_service: TokenPrecompileDispatcher::new(PrecompilePricing::new(prices, fees)),
            block_hashes: deps.block_hashes,
            prng: RunningHashSeed,
            vm_config,
            redirect_token_calls: properties.redirect_token_calls_enabled,
        };
        info!(
            versions = registry.len(),
            latest = %registry.latest().version(),
            redirect = properties.redirect_token_calls_enabled,
            "simulation service ready"
        );
        Ok(Self {
            properties,
            registry,
            engine: Arc::new(engine),
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        })
    }

    /// Engine settings.
    #[must_use]
    pub fn properties(&self) -> &EvmProperties {
        &self.properties
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Runs one request with `tracer`.
    #[instrument(
        skip(self, request, tracer),
        fields(correlation_id = %correlation_id, sender = %request.sender)
    )]
    async fn execute(
        &self,
        correlation_id: Uuid,
        request: CallRequest,
        tracer: StepTracer,
    ) -> Result<ExecutionResult, VmError> {
        if request.gas_limit > self.properties.max_gas_limit {
            warn!(
                requested = request.gas_limit,
                max = self.properties.max_gas_limit,
                "gas limit above cap"
            );
            self.stats.write().await.rejected_requests += 1;
            return Err(VmError::GasLimitExceeded {
                requested: request.gas_limit,
                max: self.properties.max_gas_limit,
            });
        }

        let operations = self
            .registry
            .resolve(request.block.timestamp, request.version_hint);
        debug!(version = %operations.version(), "executing");

        let is_create = request.is_create();
        let mut ctx = ExecutionContext::new_transaction(
            request.sender,
            request.to.unwrap_or_default(),
            request.value,
            request.data,
            request.gas_limit,
            request.gas_price,
            request.block,
        );
        ctx.is_static = request.is_static;

        let timeout = self.properties.execution_timeout();
        let timeout_ms = self.properties.execution_timeout_ms;
        let cancel = Arc::new(AtomicBool::new(false));
        let engine = Arc::clone(&self.engine);
        let task_cancel = Arc::clone(&cancel);
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            engine.run(&operations, ctx, is_create, tracer, &task_cancel, timeout_ms)
        });

        let outcome = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => Err(VmError::Internal(join_error.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                #[allow(clippy::cast_possible_truncation)]
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!(elapsed_ms, max_ms = timeout_ms, "call deadline exceeded");
                self.stats.write().await.timeouts += 1;
                return Err(VmError::Timeout {
                    elapsed_ms,
                    max_ms: timeout_ms,
                });
            }
        };

        match outcome {
            Ok(result) => {
                let halt = result.halt_reason.map(|reason| reason.to_string());
                info!(
                    success = result.success,
                    gas_used = result.gas_used,
                    halt = halt.as_deref().unwrap_or(""),
                    "call completed"
                );
                metrics::record_call(
                    result.gas_used,
                    (!result.success).then(|| halt.as_deref().unwrap_or("REVERT")),
                );
                let mut stats = self.stats.write().await;
                stats.calls_executed += 1;
                stats.total_gas_used = stats.total_gas_used.saturating_add(result.gas_used);
                if result.success {
                    stats.successful_calls += 1;
                } else {
                    stats.failed_calls += 1;
                }
                Ok(result)
            }
            Err(err) => {
                match &err {
                    VmError::Cancelled | VmError::Timeout { .. } => {
                        warn!(error = %err, "call aborted");
                        self.stats.write().await.timeouts += 1;
                    }
                    VmError::StateError(StateError::Snapshot(_)) => {
                        error!(error = %err, "snapshot read failed");
                    }
                    _ => error!(error = %err, "call aborted"),
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl SimulationApi for SimulationService {
    async fn call(&self, request: CallRequest) -> Result<ExecutionResult, VmError> {
        self.execute(Uuid::new_v4(), request, StepTracer::disabled())
            .await
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, VmError> {
        let correlation_id = Uuid::new_v4();
        let ceiling = request.gas_limit;
        let first = self
            .execute(correlation_id, request.clone(), StepTracer::disabled())
            .await?;
        if !first.success {
            let reason = first
                .revert_reason
                .or_else(|| first.halt_reason.map(|reason| reason.to_string()))
                .unwrap_or_else(|| "execution failed".to_string());
            return Err(VmError::Revert(reason));
        }

        // Below the gross usage the call cannot have had enough gas.
        let mut low = first
            .gas_used
            .saturating_add(first.gas_refund)
            .saturating_sub(1);
        let mut high = ceiling;
        while low + 1 < high {
            let mid = low + (high - low) / 2;
            let probe = self
                .execute(
                    correlation_id,
                    request.clone().with_gas_limit(mid),
                    StepTracer::disabled(),
                )
                .await?;
            if probe.success {
                high = mid;
            } else {
                low = mid;
            }
        }
        debug!(%correlation_id, estimate = high, "gas estimated");
        Ok(high)
    }

    async fn trace_opcodes(
        &self,
        request: CallRequest,
        options: TraceOptions,
    ) -> Result<ExecutionResult, VmError> {
        let tracer = StepTracer::new(crate::domain::entities::TracerType::Opcode, options);
        self.execute(Uuid::new_v4(), request, tracer).await
    }
}

/// Service over an in-memory snapshot, with zero contract-call prices at
/// the epoch and a fixed 1:12 exchange rate.
///
/// # Errors
///
/// `ConfigError` when `properties` carries a bad version table.
pub fn create_test_service(
    snapshot: InMemorySnapshot,
    properties: EvmProperties,
) -> Result<SimulationService, ConfigError> {
    let schedule = Arc::new(StaticFeeSchedule::new().with_prices_for(
        Timestamp::from_seconds(0),
        &[Functionality::ContractCall, Functionality::TokenGetInfo],
        FeeData::default(),
    ));
    let rates = Arc::new(StaticExchangeRates::fixed(ExchangeRate::new(1, 12)));
    SimulationService::new(
        properties,
        ServiceDependencies {
            snapshot: Arc::new(snapshot),
            usage_prices: schedule,
            exchange: rates,
            block_hashes: Arc::new(InMemoryBlockHashes::new()),
        },
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VersionEntry;
    use crate::domain::entities::{Account, BlockContext};
    use crate::domain::value_objects::{Address, Bytes, SemanticVersion, U256};
    use crate::errors::ExceptionalHaltReason;

    const SENDER: u64 = 1002;
    const CONTRACT: u64 = 1001;

    /// PUSH1 32 PUSH1 0 RETURN
    const RETURN_WORD: [u8; 5] = [0x60, 0x20, 0x60, 0x00, 0xf3];
    /// PUSH1 0 PUSH1 0 REVERT
    const REVERT_EMPTY: [u8; 5] = [0x60, 0x00, 0x60, 0x00, 0xfd];
    /// JUMPDEST PUSH1 0 JUMP
    const SPIN: [u8; 4] = [0x5b, 0x60, 0x00, 0x56];
    /// PUSH0 PUSH0 RETURN
    const PUSH0_RETURN: [u8; 3] = [0x5f, 0x5f, 0xf3];

    fn service_with(code: &[u8], properties: EvmProperties) -> SimulationService {
        let snapshot = InMemorySnapshot::new()
            .with_account(Account::new_eoa(
                Address::from_low_u64(SENDER),
                U256::from(1_000_000_000u64),
            ))
            .with_account(Account::new_contract(
                Address::from_low_u64(CONTRACT),
                Bytes::from_slice(code),
            ));
        create_test_service(snapshot, properties).unwrap()
    }

    fn request() -> CallRequest {
        CallRequest::new(
            Address::from_low_u64(SENDER),
            Some(Address::from_low_u64(CONTRACT)),
            Bytes::new(),
            BlockContext {
                timestamp: Timestamp::from_seconds(1),
                ..BlockContext::default()
            },
        )
        .with_gas_limit(100_000)
    }

    #[tokio::test]
    async fn test_call_returns_output_and_counts() {
        let service = service_with(&RETURN_WORD, EvmProperties::default());

        let result = service.call(request()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.output.len(), 32);
        let stats = service.stats().await;
        assert_eq!(stats.calls_executed, 1);
        assert_eq!(stats.successful_calls, 1);
        assert_eq!(stats.total_gas_used, result.gas_used);
    }

    #[tokio::test]
    async fn test_gas_limit_above_cap_rejected() {
        let service = service_with(&RETURN_WORD, EvmProperties::default());

        let result = service.call(request().with_gas_limit(15_000_001)).await;

        assert!(matches!(
            result,
            Err(VmError::GasLimitExceeded { requested: 15_000_001, max: 15_000_000 })
        ));
        assert_eq!(service.stats().await.rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_revert_is_reported_not_raised() {
        let service = service_with(&REVERT_EMPTY, EvmProperties::default());

        let result = service.call(request()).await.unwrap();

        assert!(!result.success);
        assert_eq!(service.stats().await.failed_calls, 1);
    }

    #[tokio::test]
    async fn test_estimate_gas_is_tight() {
        let service = service_with(&RETURN_WORD, EvmProperties::default());

        let estimate = service.estimate_gas(request()).await.unwrap();

        let at = service.call(request().with_gas_limit(estimate)).await.unwrap();
        let below = service
            .call(request().with_gas_limit(estimate - 1))
            .await
            .unwrap();
        assert!(at.success);
        assert!(!below.success);
    }

    #[tokio::test]
    async fn test_estimate_gas_of_reverting_call_fails() {
        let service = service_with(&REVERT_EMPTY, EvmProperties::default());

        let result = service.estimate_gas(request()).await;

        assert!(matches!(result, Err(VmError::Revert(_))));
    }

    #[tokio::test]
    async fn test_deadline_cancels_call() {
        let properties = EvmProperties {
            execution_timeout_ms: 1,
            ..EvmProperties::default()
        };
        let service = service_with(&SPIN, properties);

        let result = service.call(request().with_gas_limit(15_000_000)).await;

        assert!(matches!(result, Err(VmError::Timeout { max_ms: 1, .. })));
        assert_eq!(service.stats().await.timeouts, 1);
    }

    #[tokio::test]
    async fn test_trace_opcodes_records_steps() {
        let service = service_with(&RETURN_WORD, EvmProperties::default());

        let result = service
            .trace_opcodes(request(), TraceOptions::default())
            .await
            .unwrap();

        let ops: Vec<&str> = result.opcodes.iter().map(|s| s.op.as_str()).collect();
        assert_eq!(ops, vec!["PUSH1", "PUSH1", "RETURN"]);
        assert_eq!(result.opcodes[1].stack, vec![U256::from(32)]);
    }

    #[tokio::test]
    async fn test_version_hint_selects_operation_set() {
        let service = service_with(&PUSH0_RETURN, EvmProperties::default());

        let shanghai = service
            .call(request().with_version_hint(SemanticVersion::new(0, 38, 0)))
            .await
            .unwrap();
        let paris = service
            .call(request().with_version_hint(SemanticVersion::new(0, 34, 0)))
            .await
            .unwrap();

        assert!(shanghai.success);
        assert_eq!(paris.halt_reason, Some(ExceptionalHaltReason::InvalidOperation));
    }

    #[test]
    fn test_bad_version_table_rejected() {
        let properties = EvmProperties {
            evm_versions: vec![VersionEntry::new(SemanticVersion::new(0, 99, 0), 0)],
            ..EvmProperties::default()
        };

        let result = create_test_service(InMemorySnapshot::new(), properties);

        assert!(matches!(result, Err(ConfigError::UnknownVersion(_))));
    }
}
