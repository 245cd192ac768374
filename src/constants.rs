//! 🎯 KAGAN CORE CONSTANTS: system-wide configuration values
//! DECISION ARCHAEOLOGY: each constant includes reasoning for its specific value
//! AUDIT: verify these values align with deployment constraints and operator expectations

// ⚙️ SCHEDULER CONFIGURATION
/// 🚦 DEFAULT EVENT QUEUE CAPACITY: bounded FIFO for status-change events
/// Why: 256 covers bursts of board activity (bulk task moves) without unbounded growth
/// Alternative: unbounded (rejected: a runaway TaskStore notifier could OOM the process)
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// ⏳ CAPACITY BACKOFF DELAY: how long ensure_running waits before re-queueing
/// Why: 1s is long enough to let a finishing task free a slot, short enough that
/// a capacity-bound board still feels responsive
/// Alternative: 100ms (rejected: busy-loops the worker under sustained capacity pressure)
pub const CAPACITY_BACKOFF_DELAY_MS: u64 = 1000;

/// 📏 SCRATCHPAD TAIL SAMPLE: bytes of a single iteration's response appended per banner
/// Why: 2000 chars keeps the scratchpad readable context without re-appending entire
/// agent transcripts every iteration
pub const SCRATCHPAD_ITERATION_TAIL_CHARS: usize = 2000;

// 🔌 AGENT DRIVER CONFIGURATION
/// 🪟 DEFAULT MESSAGE BUS REPLAY CAPACITY: entries retained for late subscribers
/// Why: 200 covers a typical iteration's worth of text/tool-call/thinking events
/// Alternative: unbounded (rejected: a runaway agent session should not grow memory forever)
pub const DEFAULT_MESSAGE_BUS_REPLAY_CAPACITY: usize = 200;

/// 🔁 CIRCUIT BREAKER FAILURE THRESHOLD: consecutive agent-startup failures before tripping
/// Why: 5 tolerates transient hiccups (cold filesystem cache, brief PATH issues) while
/// still protecting against hammering a genuinely broken `run_command`
pub const AGENT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// ⏲️ CIRCUIT BREAKER OPEN DURATION: how long a tripped breaker refuses new spawns
/// Why: 60s gives an operator time to notice and fix a misconfigured agent binary
pub const AGENT_CIRCUIT_OPEN_SECS: u64 = 60;

/// ✅ CIRCUIT BREAKER SUCCESS THRESHOLD: consecutive successes needed to fully close again
pub const AGENT_CIRCUIT_SUCCESS_THRESHOLD: u32 = 3;

// 🗂️ WORKSPACE CONFIGURATION
/// ✂️ BRANCH SLUG MAX LENGTH: keep generated branch names readable and filesystem-safe
/// Why: 40 chars of slug plus the task id prefix stays well under common path length
/// limits across platforms while preserving enough of the title to be recognizable
pub const BRANCH_SLUG_MAX_LENGTH: usize = 40;

/// 📁 GENERATED FILE ALLOWLIST: tool-config paths excluded from the uncommitted-changes
/// check so a merge precondition is never blocked by files agents regenerate on every run
pub const GENERATED_FILE_PATTERNS: &[&str] = &[
    ".mcp.json",
    ".claude/settings.local.json",
    ".vscode/",
    ".idea/",
    ".gitignore",
    ".dockerignore",
];

// 🏷️ COMMIT MESSAGE SYNTHESIS
/// 🔍 COMMIT TYPE KEYWORD TABLE: deterministic title→conventional-commit-type lookup,
/// checked in order; first matching keyword wins
pub const COMMIT_TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("fix", &["fix", "bug", "issue"]),
    ("feat", &["add", "create", "implement", "new"]),
    ("refactor", &["refactor", "clean", "improve"]),
    ("docs", &["doc", "readme"]),
    ("test", &["test"]),
];

/// 🧱 COMMIT SCOPE STOPWORDS: common words that don't make useful commit scopes
pub const COMMIT_SCOPE_STOPWORDS: &[&str] = &["the", "for", "and", "with", "from", "into"];

/// 🔚 DEFAULT CONVENTIONAL COMMIT TYPE: when no keyword matches the title
pub const DEFAULT_COMMIT_TYPE: &str = "chore";

// 🧩 AGENT CONFIG RESOLUTION
/// 🪂 FALLBACK AGENT COMMAND: used when neither the task nor the operator config
/// names a worker agent identity, so run_task_loop never has nothing to spawn
pub const FALLBACK_AGENT_COMMAND: &str = "claude";
