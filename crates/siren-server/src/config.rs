use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub auto_resolve: AutoResolveConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            correlation: CorrelationConfig::default(),
            escalation: EscalationConfig::default(),
            auto_resolve: AutoResolveConfig::default(),
            rules: RulesConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// 相关性时间窗口（秒）
    #[serde(default = "default_correlation_window_secs")]
    pub window_secs: u64,
    /// 触发队列容量
    #[serde(default = "default_correlation_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_secs: default_correlation_window_secs(),
            queue_capacity: default_correlation_queue_capacity(),
        }
    }
}

fn default_correlation_window_secs() -> u64 {
    300
}

fn default_correlation_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// 升级扫描间隔（秒）
    #[serde(default = "default_escalation_tick_secs")]
    pub tick_secs: u64,
    /// 单次扫描处理上限
    #[serde(default = "default_sweep_batch_limit")]
    pub batch_limit: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_escalation_tick_secs(),
            batch_limit: default_sweep_batch_limit(),
        }
    }
}

fn default_escalation_tick_secs() -> u64 {
    60
}

fn default_sweep_batch_limit() -> usize {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoResolveConfig {
    /// 自动处理扫描间隔（秒）
    #[serde(default = "default_auto_resolve_tick_secs")]
    pub tick_secs: u64,
    /// 静默阈值（小时）
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
    /// 单次扫描处理上限
    #[serde(default = "default_sweep_batch_limit")]
    pub batch_limit: usize,
}

impl Default for AutoResolveConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_auto_resolve_tick_secs(),
            stale_after_hours: default_stale_after_hours(),
            batch_limit: default_sweep_batch_limit(),
        }
    }
}

fn default_auto_resolve_tick_secs() -> u64 {
    300
}

fn default_stale_after_hours() -> u64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// 规则缓存刷新间隔（秒）
    #[serde(default = "default_rule_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_rule_refresh_secs(),
        }
    }
}

fn default_rule_refresh_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook 通知地址（为空时不发送通知）
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// 通知的最低告警级别
    #[serde(default = "default_notify_min_severity")]
    pub min_severity: String,
    /// 通知请求超时（秒）
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    /// CRITICAL 告警创建路径上同步通知的超时（秒）
    #[serde(default = "default_critical_notify_timeout_secs")]
    pub critical_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            min_severity: default_notify_min_severity(),
            timeout_secs: default_notify_timeout_secs(),
            critical_timeout_secs: default_critical_notify_timeout_secs(),
        }
    }
}

fn default_notify_min_severity() -> String {
    "high".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_critical_notify_timeout_secs() -> u64 {
    5
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}
