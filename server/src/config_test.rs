use super::*;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__WB_TEST_NONEXISTENT_KEY__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__WB_TEST_EP_VALID__", " 99 ") };
    let val: usize = env_parse("__WB_TEST_EP_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__WB_TEST_EP_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__WB_TEST_EP_INVALID__", "notanumber") };
    let val: u16 = env_parse("__WB_TEST_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__WB_TEST_EP_INVALID__") };
}

// =============================================================================
// ServerConfig
// =============================================================================

#[test]
fn default_config_uses_memory_store_on_port_5001() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 5001);
    assert!(config.database_url.is_none());
    assert_eq!(config.db_max_connections, 5);
    assert_eq!(config.client_channel_capacity, 256);
    assert_eq!(config.message_history_limit, 50);
}

#[test]
fn history_limit_cap_is_above_default() {
    assert!(MAX_MESSAGE_HISTORY_LIMIT >= ServerConfig::default().message_history_limit);
}
