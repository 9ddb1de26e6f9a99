//! Command gateway: the public call API
//!
//! Every operation checks the caller's permission, then the shape of its
//! arguments (call ids must exist, slot ids must be configured, strings
//! must be well formed) before anything reaches the engine. Store-level
//! `NotFound` errors are reported as `InvalidArgument`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telcall_core::{CallGateway, CallManagerConfig, DialCallOptions, LoopbackRadio};
//!
//! # async fn example() -> telcall_core::CallResult<()> {
//! let (radio, signals) = LoopbackRadio::new();
//! let gateway = CallGateway::new(CallManagerConfig::default(), Arc::new(radio))?;
//! gateway.attach_signals(signals);
//!
//! let outcome = gateway.dial_call("10086", DialCallOptions::new()).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::permissions::{Permission, PermissionSet};
use crate::adapters::ability::{AbilityHost, AbilityRequest};
use crate::adapters::radio::{RadioLink, RadioSignal, SignalEvent};
use crate::config::{CallManagerConfig, MAX_REJECT_MESSAGE_LEN};
use crate::errors::{CallError, CallResult};
use crate::events::{CallEventHandler, EventKind, EventSubscriber, SubscriptionId};
use crate::state_machine::CallEngine;
use crate::types::{
    CallId, CallRecord, CallType, DialCallOptions, DialScene, DialType, IncomingCallInfo, NewCall, RejectMessage,
    SlotId, VideoState,
};
use crate::utils::mmi::MmiCode;
use crate::utils::number::DialString;

/// What `dial_call` did with the dial string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialOutcome {
    /// A call was created
    Call(CallId),
    /// The string was an MMI code and went to the network; the result
    /// arrives as `mmiCodeResult`
    MmiDispatched,
}

impl DialOutcome {
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            DialOutcome::Call(call_id) => Some(*call_id),
            DialOutcome::MmiDispatched => None,
        }
    }
}

/// What `make_call` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MakeCallOutcome {
    /// The dialer screen was opened with the number filled in
    AbilityStarted,
    /// No ability host is configured; the number was dialed directly
    Dialed(DialOutcome),
}

/// Entry point for applications: validates requests and forwards them to
/// the [`CallEngine`]
pub struct CallGateway {
    pub(crate) engine: Arc<CallEngine>,
    pub(crate) permissions: PermissionSet,
    ability_host: Option<Arc<dyn AbilityHost>>,
    signal_pump: Mutex<Option<JoinHandle<()>>>,
}

impl CallGateway {
    /// Create a gateway with every permission granted
    pub fn new(config: CallManagerConfig, radio: Arc<dyn RadioLink>) -> CallResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: CallEngine::new(config, radio),
            permissions: PermissionSet::all(),
            ability_host: None,
            signal_pump: Mutex::new(None),
        })
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_ability_host(mut self, host: Arc<dyn AbilityHost>) -> Self {
        self.ability_host = Some(host);
        self
    }

    /// Start consuming the radio's signal channel. A previously attached
    /// channel is detached.
    pub fn attach_signals(&self, signals: mpsc::UnboundedReceiver<RadioSignal>) {
        let handle = self.engine.spawn_signal_pump(signals);
        if let Some(previous) = self.signal_pump.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn engine(&self) -> &Arc<CallEngine> {
        &self.engine
    }

    pub fn config(&self) -> &CallManagerConfig {
        self.engine.config()
    }

    // ===== Validation helpers =====

    pub(crate) fn require(&self, permission: Permission) -> CallResult<()> {
        self.permissions.check(permission).inspect_err(|e| {
            warn!("Rejected request: {}", e);
        })
    }

    pub(crate) async fn require_call(&self, call_id: CallId) -> CallResult<CallRecord> {
        self.engine
            .store()
            .get(call_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub(crate) fn require_slot(&self, slot: SlotId) -> CallResult<()> {
        if self.config().is_valid_slot(slot) {
            Ok(())
        } else {
            Err(CallError::invalid_argument(format!(
                "slot {} is out of range (0..{})",
                slot,
                self.config().slot_count
            )))
        }
    }

    // ===== Calls =====

    /// Dial a number, or dispatch it as an MMI request when it is one.
    ///
    /// Emergency numbers always place a call, even when they would also
    /// parse as an MMI short code.
    pub async fn dial_call(&self, number: &str, options: DialCallOptions) -> CallResult<DialOutcome> {
        self.require(Permission::PlaceCall)?;
        let slot = options.account_id.unwrap_or(self.config().default_slot);
        self.require_slot(slot)?;
        let parsed = DialString::parse(number, self.config().max_number_len)?;

        let is_emergency =
            options.dial_scene == DialScene::Emergency || self.config().is_emergency_number(&parsed.number);
        if !is_emergency && parsed.post_dial.is_none() {
            let has_cellular_call = !self
                .engine
                .store()
                .list(|r| r.call_type.is_cellular() && !r.state.is_ending())
                .await
                .is_empty();
            if let Some(code) = MmiCode::parse(&parsed.number, has_cellular_call) {
                info!("Dispatching MMI code on slot {}", slot);
                self.engine
                    .radio()
                    .send_mmi(slot, &code)
                    .await
                    .map_err(|e| CallError::service_unavailable(format!("MMI request failed: {}", e)))?;
                return Ok(DialOutcome::MmiDispatched);
            }
        }

        let call_type = if options.dial_type == DialType::Ott {
            CallType::Ott
        } else if options.video_state.is_video() {
            CallType::Ims
        } else {
            CallType::Cs
        };
        let mut call = NewCall::outgoing(parsed.number, slot)
            .with_call_type(call_type)
            .with_video_state(options.video_state);
        call.is_emergency = is_emergency;
        call.dial_scene = if is_emergency {
            DialScene::Emergency
        } else {
            options.dial_scene
        };
        call.dial_type = options.dial_type;
        call.post_dial = parsed.post_dial;

        let call_id = self.engine.dial(call).await.map_err(CallError::into_api_error)?;
        Ok(DialOutcome::Call(call_id))
    }

    /// Open the dialer with `number` filled in, or dial it directly when
    /// no ability host is configured
    pub async fn make_call(&self, number: &str) -> CallResult<MakeCallOutcome> {
        match self.ability_host.clone() {
            Some(host) => {
                self.make_call_with_host(host.as_ref(), number).await?;
                Ok(MakeCallOutcome::AbilityStarted)
            }
            None => {
                debug!("No ability host; dialing {} directly", number);
                let outcome = self.dial_call(number, DialCallOptions::new()).await?;
                Ok(MakeCallOutcome::Dialed(outcome))
            }
        }
    }

    /// Open the dialer through an explicit host. The number is handed over
    /// as typed, empty or not; the user edits it before calling.
    pub async fn make_call_with_host(&self, host: &dyn AbilityHost, number: &str) -> CallResult<()> {
        self.require(Permission::PlaceCall)?;
        host.start_ability(AbilityRequest::edit_before_calling(number))
            .await
            .map_err(|e| CallError::service_unavailable(format!("failed to start dialer: {}", e)))
    }

    pub async fn answer_call(&self, call_id: CallId, video_state: VideoState) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine
            .answer(call_id, video_state)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn reject_call(&self, call_id: CallId, message: RejectMessage) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        if let Some(text) = &message.message {
            if text.chars().count() > MAX_REJECT_MESSAGE_LEN {
                return Err(CallError::invalid_argument(format!(
                    "reject message longer than {} characters",
                    MAX_REJECT_MESSAGE_LEN
                )));
            }
        }
        self.require_call(call_id).await?;
        self.engine
            .reject(call_id, message.message.as_deref())
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn hang_up_call(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.hang_up(call_id).await.map_err(CallError::into_api_error)
    }

    pub async fn hold_call(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.hold(call_id).await.map_err(CallError::into_api_error)
    }

    pub async fn un_hold_call(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.unhold(call_id).await.map_err(CallError::into_api_error)
    }

    /// Swap the active call with the held call `call_id`
    pub async fn switch_call(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.switch(call_id).await.map_err(CallError::into_api_error)
    }

    /// Snapshot of one call
    pub async fn get_call(&self, call_id: CallId) -> CallResult<CallRecord> {
        self.require_call(call_id).await
    }

    /// Snapshots of every call in the store, including recently ended ones
    pub async fn list_calls(&self) -> Vec<CallRecord> {
        self.engine.store().list(|_| true).await
    }

    // ===== Events =====

    /// Register a handler for one event kind
    pub fn on(&self, kind: EventKind, handler: Arc<dyn CallEventHandler>) -> SubscriptionId {
        self.engine.dispatcher().subscribe(kind, handler)
    }

    /// Register a handler by event name (`callDetailsChange`, ...)
    pub fn on_named(&self, name: &str, handler: Arc<dyn CallEventHandler>) -> CallResult<SubscriptionId> {
        let kind: EventKind = name.parse()?;
        Ok(self.on(kind, handler))
    }

    /// Remove a handler. When this returns it will not be called again.
    pub async fn off(&self, subscription: SubscriptionId) -> bool {
        self.engine.dispatcher().unsubscribe(subscription).await
    }

    /// Receive events of the given kinds through a channel
    pub fn subscribe_channel(&self, kinds: &[EventKind]) -> EventSubscriber {
        self.engine.dispatcher().subscribe_channel(kinds)
    }

    // ===== Signalling ingress =====

    /// Report an asynchronous outcome for one call
    pub async fn handle_signal(&self, call_id: CallId, event: SignalEvent) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .handle_call_signal(call_id, event)
            .await
            .map_err(CallError::into_api_error)
    }

    /// Report a new inbound call
    pub async fn handle_incoming_call(&self, incoming: IncomingCallInfo) -> CallResult<CallId> {
        self.require_slot(incoming.account_id)?;
        self.engine
            .handle_incoming(incoming)
            .await
            .map_err(CallError::into_api_error)
    }
}

impl Drop for CallGateway {
    fn drop(&mut self) {
        if let Some(pump) = self.signal_pump.lock().take() {
            pump.abort();
        }
    }
}
