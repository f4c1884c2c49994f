use std::collections::HashMap;

use bytes::Bytes;
use hostevm_common::{Address, U256, types::Message};
use hostevm_storage::CacheStore;
use tracing::{Span, debug, error, info_span};

use super::{
    DispatchError,
    abi::{Function, Value},
    handlers,
};

/// Call metadata handed to handlers next to the decoded parameters.
#[derive(Debug, Clone, Default)]
pub struct RawCall {
    pub input: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_tip_cap: U256,
    pub gas_fee_cap: U256,
}

impl From<&Message> for RawCall {
    fn from(msg: &Message) -> Self {
        Self {
            input: msg.data.clone(),
            nonce: msg.nonce,
            gas_limit: msg.gas_limit,
            gas_price: msg.gas_price,
            gas_tip_cap: msg.gas_tip_cap,
            gas_fee_cap: msg.gas_fee_cap,
        }
    }
}

pub struct HandlerContext<'s, 'a> {
    pub caller: Address,
    pub method: Function,
    pub params: Vec<Value>,
    pub commit: bool,
    pub span: Span,
    pub state: &'s mut CacheStore<'a>,
    pub call: RawCall,
}

impl HandlerContext<'_, '_> {
    /// Parameter `index`, the ABI decoder guarantees it exists for well formed calls.
    pub fn param(&self, index: usize) -> Result<&Value, DispatchError> {
        self.params.get(index).ok_or_else(|| {
            DispatchError::InvalidInput(format!("missing parameter {index} of {}", self.method.name))
        })
    }
}

/// A method of the system contract.
pub trait Handler: Send + Sync {
    /// Lower-cased method name the handler is registered under.
    fn method(&self) -> &'static str;

    /// Canonical ABI signature, used to derive the selector.
    fn signature(&self) -> &'static str;

    /// Runs the method with `gas` available, returning the ABI encoded output and the
    /// gas left.
    fn handle(
        &self,
        ctx: &mut HandlerContext<'_, '_>,
        gas: u64,
    ) -> Result<(Bytes, u64), DispatchError>;
}

/// Method registry of the system contract, built once and shared by every call.
pub struct SystemContract {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
    methods: HashMap<[u8; 4], Function>,
}

impl Default for SystemContract {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemContract {
    pub fn new() -> Self {
        let mut contract = Self {
            handlers: HashMap::new(),
            methods: HashMap::new(),
        };
        contract.register(Box::new(handlers::DeployHandler));
        contract.register(Box::new(handlers::UpgradeHandler));
        contract.register(Box::new(handlers::BindHandler));
        contract.register(Box::new(handlers::UnbindHandler));
        contract.register(Box::new(handlers::ChangeVersionHandler));
        contract.register(Box::new(handlers::GetVersionHandler));
        contract.register(Box::new(handlers::GetBindingHandler));
        contract.register(Box::new(handlers::GetBoundAddressHandler));
        contract
    }

    pub(crate) fn register(&mut self, handler: Box<dyn Handler>) {
        let function = match Function::parse(handler.signature()) {
            Ok(function) => function,
            Err(err) => {
                error!(method = handler.method(), %err, "Skipping system contract method with invalid signature");
                return;
            }
        };
        self.methods.insert(function.selector(), function);
        self.handlers.insert(handler.method(), handler);
    }

    /// Functions exposed by the contract.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.methods.values()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.methods
            .values()
            .find(|function| function.name.eq_ignore_ascii_case(name))
    }

    /// Decodes `msg.data` and runs the matching handler with `gas` available.
    pub fn dispatch(
        &self,
        msg: &Message,
        state: &mut CacheStore<'_>,
        gas: u64,
        commit: bool,
    ) -> Result<(Bytes, u64), DispatchError> {
        let Some((selector, input)) = msg.data.split_first_chunk::<4>() else {
            return Err(DispatchError::InvalidInput(
                "calldata shorter than a selector".to_string(),
            ));
        };
        let function = self
            .methods
            .get(selector)
            .ok_or_else(|| DispatchError::MethodNotFound(format!("0x{}", hex::encode(selector))))?;
        let params = function.decode_input(input)?;

        let method = function.name.to_lowercase();
        let handler = self
            .handlers
            .get(method.as_str())
            .ok_or_else(|| DispatchError::MethodNotFound(function.name.clone()))?;

        let span = info_span!("system_contract", module = "aspect-system-contract", method = %function.name);
        debug!(parent: &span, caller = %msg.from, commit, gas, "Dispatching system contract call");

        let mut ctx = HandlerContext {
            caller: msg.from,
            method: function.clone(),
            params,
            commit,
            span,
            state,
            call: RawCall::from(msg),
        };
        handler.handle(&mut ctx, gas)
    }
}
