//! Simulate command - drive the engine against a loopback radio

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use telcall_core::{
    CallGateway, CallId, CallManagerConfig, CallState, DialCallOptions, DialOutcome, EventKind, EventSubscriber,
    IncomingCallInfo, LoopbackRadio, VideoState,
};
use tracing::{debug, info};

use crate::cli::Scenario;

const STATE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const SETTLE: Duration = Duration::from_millis(50);

pub async fn execute(scenario: Scenario, number: &str, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => CallManagerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CallManagerConfig::default(),
    };
    let retention = config.disconnected_retention;

    let (radio, signals) = LoopbackRadio::new();
    let radio = Arc::new(radio.with_auto_connect(true));
    let gateway = CallGateway::new(config, radio.clone()).context("failed to start call engine")?;
    gateway.attach_signals(signals);

    let subscriber = gateway.subscribe_channel(&EventKind::ALL);
    let printer = tokio::spawn(print_events(subscriber));

    info!("Running {:?} scenario", scenario);
    match scenario {
        Scenario::Basic => basic(&gateway, number).await?,
        Scenario::Incoming => incoming(&gateway, number).await?,
        Scenario::Conference => conference(&gateway, number).await?,
    }

    // Let reclaim and the last deliveries finish before tearing down
    tokio::time::sleep(retention + SETTLE).await;
    printer.abort();

    let ops = radio.ops();
    debug!("Radio saw {} requests: {:?}", ops.len(), ops);
    Ok(())
}

async fn print_events(mut subscriber: EventSubscriber) {
    while let Some(event) = subscriber.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to encode {:?}: {}", event.kind(), e),
        }
    }
}

async fn dial(gateway: &CallGateway, number: &str) -> Result<CallId> {
    match gateway.dial_call(number, DialCallOptions::new()).await? {
        DialOutcome::Call(call_id) => Ok(call_id),
        DialOutcome::MmiDispatched => bail!("{} is an MMI code, not a callable number", number),
    }
}

async fn wait_for_state(gateway: &CallGateway, call_id: CallId, state: CallState) -> Result<()> {
    let reached = tokio::time::timeout(STATE_TIMEOUT, async {
        loop {
            match gateway.get_call(call_id).await {
                Ok(record) if record.state == state => return true,
                Ok(_) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(_) => return false,
            }
        }
    })
    .await;
    match reached {
        Ok(true) => Ok(()),
        Ok(false) => bail!("call {} ended before reaching {}", call_id, state),
        Err(_) => bail!("call {} did not reach {} within {:?}", call_id, state, STATE_TIMEOUT),
    }
}

async fn basic(gateway: &CallGateway, number: &str) -> Result<()> {
    let call_id = dial(gateway, number).await?;
    wait_for_state(gateway, call_id, CallState::Active).await?;

    gateway.hold_call(call_id).await?;
    wait_for_state(gateway, call_id, CallState::Holding).await?;
    gateway.un_hold_call(call_id).await?;
    wait_for_state(gateway, call_id, CallState::Active).await?;

    gateway.hang_up_call(call_id).await?;
    Ok(())
}

async fn incoming(gateway: &CallGateway, number: &str) -> Result<()> {
    let slot = gateway.config().default_slot;
    let first = gateway.handle_incoming_call(IncomingCallInfo::new(number, slot)).await?;
    gateway.answer_call(first, VideoState::Voice).await?;
    wait_for_state(gateway, first, CallState::Active).await?;

    let second = gateway
        .handle_incoming_call(IncomingCallInfo::new("10010", slot))
        .await?;
    wait_for_state(gateway, second, CallState::Waiting).await?;
    gateway.answer_call(second, VideoState::Voice).await?;
    wait_for_state(gateway, second, CallState::Active).await?;
    wait_for_state(gateway, first, CallState::Holding).await?;

    gateway.hang_up_call(second).await?;
    gateway.hang_up_call(first).await?;
    Ok(())
}

async fn conference(gateway: &CallGateway, number: &str) -> Result<()> {
    let first = dial(gateway, number).await?;
    wait_for_state(gateway, first, CallState::Active).await?;
    let second = dial(gateway, "10010").await?;
    wait_for_state(gateway, second, CallState::Active).await?;

    gateway.combine_conference(second).await?;
    let members = gateway.get_call_id_list_for_conference(second).await?;
    info!("Conference {} has members {:?}", second, members);

    gateway.kick_out_from_conference(first).await?;
    gateway.hang_up_call(second).await?;
    Ok(())
}
