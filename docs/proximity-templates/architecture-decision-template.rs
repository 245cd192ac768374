//! 🏗️ ARCHITECTURE DECISION TEMPLATE
//! Based on spiral-core/src/agents/orchestrator/mod.rs - comprehensive decision archaeology
//! Pattern: Major architectural choices include reasoning, alternatives, and audit points

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// 🏗️ [SYSTEM NAME]: [Brief system description]
/// ARCHITECTURE DECISION: [Major architectural choice made]
/// Why: [Primary reasoning for this architecture]
/// Alternative: [What was rejected and specific reasons]
/// Audit: [How to verify this architecture is working correctly]
/// Scale: [How this architecture scales with system growth]
#[derive(Clone)]
pub struct SystemArchitecture {
    // 🧠 DATA STRUCTURE DECISION: [Choice of data structure]
    // Why: [Reasoning for HashMap/Vec/BTreeMap/etc choice]
    // Alternative: [Rejected data structure and why]
    // Performance: [Big O characteristics and why they matter here]
    // Audit: [How to verify performance characteristics]
    data_registry: Arc<RwLock<HashMap<KeyType, ValueType>>>,
    
    // 🔧 COORDINATION MECHANISM: [How components communicate]
    // Why: [Reasoning for channels/shared state/other coordination]
    // Alternative: [Rejected coordination approaches]
    // Audit: [How to detect coordination issues]
    coordination_layer: Arc<Mutex<CoordinationState>>,
}

impl SystemArchitecture {
    /// 🏗️ CONSTRUCTOR: System initialization with dependency injection
    /// ARCHITECTURE DECISION: [How dependencies are provided/managed]
    /// Why: [Reasoning for this dependency injection approach]
    /// Alternative: [Service locator/global state/other patterns rejected]
    /// Audit: [How to verify dependencies are correctly configured]
    pub async fn new(config: Config) -> Result<Self> {
        // 🧠 DEPENDENCY COORDINATION DECISION: [How shared dependencies are managed]
        // Why: [Reasoning for shared vs individual instances]
        // Alternative: [Individual instances per component (rejected: why?)]
        // Audit: [How to verify dependency sharing is working]
        let shared_dependency = SharedDependency::new(config.dependency_config.clone()).await?;

        // 🔧 COMPONENT REGISTRY DECISION: [How components are organized and accessed]
        // Why: [Reasoning for registry pattern vs alternatives]
        // Alternative: [Direct instantiation/factory pattern/etc (rejected: why?)]
        // Audit: [How to verify component registry integrity]
        let mut component_registry = HashMap::new();
        let mut component_statuses = HashMap::new();

        // 🚀 COMPONENT INITIALIZATION PATTERN: [How components are created and registered]
        // Why: [Reasoning for manual vs automatic registration]
        // Alternative: [Auto-discovery/reflection (rejected: why?)]
        // Future: [When to consider alternative approaches]
        Self::register_components(&mut component_registry, &mut component_statuses, &shared_dependency).await?;

        Ok(Self {
            data_registry: Arc::new(RwLock::new(component_registry)),
            coordination_layer: Arc::new(Mutex::new(CoordinationState::new())),
        })
    }

    /// 🎯 CORE OPERATION: [What this operation accomplishes]
    /// ALGORITHM DECISION: [Choice of algorithm/approach]
    /// Why: [Reasoning for this specific algorithm]
    /// Alternative: [Other algorithms considered and why rejected]
    /// Performance: [Time/space complexity and why acceptable]
    /// Audit: [How to verify algorithm is performing correctly]
    pub async fn core_operation(&self, input: InputType) -> Result<OutputType> {
        // 🔒 LOCKING STRATEGY: [How concurrent access is managed]
        // Why: [Reasoning for read locks vs write locks vs lock-free]
        // Alternative: [Other concurrency approaches rejected and why]
        // Deadlock Prevention: [How deadlocks are prevented]
        // Audit: [How to detect lock contention or deadlock issues]
        let registry = self.data_registry.read().await;
        
        // 🎯 COMPONENT SELECTION: [How the right component is chosen]
        // Why: [Reasoning for selection algorithm]
        // Alternative: [Round-robin/random/other selection (rejected: why?)]
        // Audit: [How to verify component selection is optimal]
        let selected_component = self.select_optimal_component(&input, &registry).await?;
        
        // 🔄 COORDINATION PROTOCOL: [How components coordinate]
        // Why: [Reasoning for this coordination approach]
        // Alternative: [Direct calls/message passing/other protocols rejected]
        // Audit: [How to verify coordination is working correctly]
        self.coordinate_operation(selected_component, input).await
    }

    /// 🔍 COMPONENT SELECTION: [How optimal component is determined]
    /// ALGORITHM DECISION: [Selection algorithm choice]
    /// Why: [Reasoning for this selection strategy]
    /// Alternative: [Simple selection (rejected: why?)]
    /// Metrics: [What metrics drive selection decisions]
    /// Audit: [How to verify selection optimality]
    async fn select_optimal_component(
        &self,
        input: &InputType,
        registry: &HashMap<ComponentId, Component>,
    ) -> Result<&Component> {
        // 🧠 SELECTION CRITERIA: [What factors influence selection]
        // Why: [Reasoning for these specific criteria]
        // Alternative: [Single criteria (rejected: why?)]
        // Weights: [How criteria are weighted and why]
        
        // Example selection logic with decision archaeology
        let candidates: Vec<_> = registry
            .values()
            .filter(|component| {
                // 🎯 FILTERING DECISION: [Why these filters]
                // Why: [Reasoning for capability filtering]
                component.can_handle(&input) && component.is_available()
            })
            .collect();

        // 🏆 RANKING ALGORITHM: [How candidates are ranked]
        // Why: [Reasoning for ranking criteria]
        // Alternative: [First available (rejected: poor load balancing)]
        // Metrics: [Performance/load/capability metrics used]
        candidates
            .into_iter()
            .min_by_key(|component| {
                // Ranking logic with decision reasoning
                component.current_load() + component.estimated_completion_time(input)
            })
            .ok_or_else(|| Error::NoAvailableComponent)
    }

    /// 📊 HEALTH CHECK: System health monitoring
    /// MONITORING DECISION: [What health metrics are tracked]
    /// Why: [Reasoning for these specific health indicators]
    /// Alternative: [Basic ping/detailed metrics (and why current choice)]
    /// Frequency: [How often health is checked and why]
    /// Audit: [How to verify health monitoring is accurate]
    pub async fn get_system_health(&self) -> SystemHealth {
        // 🩺 HEALTH METRICS COLLECTION: [What metrics indicate system health]
        // Why: [Reasoning for these specific metrics]
        // Alternative: [Different metrics (rejected: why?)]
        // Thresholds: [What values indicate problems and why]
        
        let registry = self.data_registry.read().await;
        let coordination = self.coordination_layer.lock().await;
        
        SystemHealth {
            component_count: registry.len(),
            healthy_components: registry.values().filter(|c| c.is_healthy()).count(),
            coordination_latency: coordination.average_latency(),
            memory_usage: self.estimate_memory_usage(&registry).await,
            uptime: coordination.uptime(),
        }
    }
}

// 🧪 ARCHITECTURE VALIDATION TESTS
// DECISION: Test architectural assumptions and invariants
// Why: Architecture bugs affect entire system
// Alternative: Only unit tests (rejected: misses integration issues)
#[cfg(test)]
mod architecture_tests {
    use super::*;

    #[tokio::test]
    async fn test_component_registration_invariants() {
        // Test: All components properly registered
        // Validates: Component registry architecture
    }

    #[tokio::test]
    async fn test_coordination_deadlock_prevention() {
        // Test: Lock ordering prevents deadlocks
        // Validates: Concurrency architecture
    }

    #[tokio::test]
    async fn test_selection_algorithm_fairness() {
        // Test: Component selection is fair under load
        // Validates: Load balancing architecture
    }

    #[tokio::test]
    async fn test_error_propagation_paths() {
        // Test: Errors propagate correctly through architecture layers
        // Validates: Error handling architecture
    }
}

// 📋 ARCHITECTURE DOCUMENTATION TEMPLATE
// Include in module-level documentation:

/// # Architecture Decision Records
/// 
/// ## ADR-001: Component Registry Pattern
/// **Decision**: Use HashMap-based component registry with Arc<RwLock<>>
/// **Reasoning**: [Detailed reasoning]
/// **Alternatives Considered**: [What was rejected]
/// **Consequences**: [Positive and negative consequences]
/// 
/// ## ADR-002: Coordination Mechanism
/// **Decision**: [Coordination choice]
/// **Reasoning**: [Detailed reasoning]
/// **Alternatives Considered**: [What was rejected]
/// **Consequences**: [Positive and negative consequences]

// Pattern Notes for Architecture Decisions:
// 1. Document major architectural choices with comprehensive reasoning
// 2. Include alternatives considered and why they were rejected
// 3. Specify audit points to verify architecture is working
// 4. Test architectural invariants, not just individual functions
// 5. Consider performance implications and document trade-offs
// 6. Plan for scale - how does this architecture grow?
// 7. Document coordination patterns to prevent deadlocks
// 8. Include health monitoring as part of architecture
// 9. Maintain Architecture Decision Records (ADRs) for major choices