//! Ambient observability metrics, registered once at process start the way
//! the teacher's `interchain-indexer-logic::metrics` module does.

use lazy_static::lazy_static;
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec};

lazy_static! {
    pub static ref TRANSFER_PASSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ima_relay_transfer_passes_total",
        "Transfer loop passes, by direction and outcome",
        &["direction", "outcome"]
    )
    .unwrap();
    pub static ref MESSAGES_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ima_relay_messages_submitted_total",
        "Messages successfully included in a submitted batch, by direction",
        &["direction"]
    )
    .unwrap();
    pub static ref INCOMING_COUNTER: IntGaugeVec = register_int_gauge_vec!(
        "ima_relay_incoming_counter",
        "Last observed incoming message counter, by direction",
        &["direction"]
    )
    .unwrap();
    pub static ref OUTGOING_COUNTER: IntGaugeVec = register_int_gauge_vec!(
        "ima_relay_outgoing_counter",
        "Last observed outgoing message counter, by direction",
        &["direction"]
    )
    .unwrap();
    pub static ref RPC_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "ima_relay_rpc_call_duration_seconds",
        "Latency of individual RPC operations",
        &["operation", "endpoint"]
    )
    .unwrap();
    pub static ref PASS_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "ima_relay_pass_duration_seconds",
        "Wall-clock duration of one transfer loop pass, by direction",
        &["direction"]
    )
    .unwrap();
}
