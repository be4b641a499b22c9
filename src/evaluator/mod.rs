//! The method evaluator: binds arguments, walks an `Expr` body, and
//! produces a `DeltaLog` plus a possibly-mutated `World`.
//!
//! Shaped after the `Evaluate<W>` / `Execute` trait split in
//! `iroha_core::smartcontracts::isi::expression` and
//! `iroha_core::smartcontracts::isi::mod`: there, every ISI expression node
//! implements `evaluate(&self, wsv, context) -> Result<Value, Error>` against
//! a shared `Context` of bound variables. Here the same shape is flattened
//! into one recursive `eval_expr`, since this evaluator owns a single
//! `EvalState` for the duration of a call rather than a reusable `Context`
//! map shared across instructions.

pub mod calendar;
pub mod homomorphic;

use std::collections::BTreeMap;

use crate::crypto;
use crate::crypto::PrivateKey;
use crate::delta::{AssetMove, BinOpTag, Delta, DeltaLog};
use crate::error::EvalFail;
use crate::evaluator::homomorphic::{Ciphertext, HomomorphicKey};
use crate::script::{BinOp, Expr, MethodTag, Prim, Script, UnOp};
use crate::storage::{hash_value, Storage};
use crate::value::{fixed_to_float, float_to_fixed, Address, DateTime, GraphState, Precision, Sig, TimeDelta, Value};
use crate::world::World;

/// Everything about "who / when / where" this call is happening. Fixed for
/// the duration of one method invocation.
#[derive(Debug, Clone)]
pub struct EvalCtx {
    pub current_block: Address,
    pub current_validator: Address,
    pub current_transaction: Vec<u8>,
    pub current_timestamp: i64,
    pub current_created: i64,
    pub current_deployer: Address,
    pub current_tx_issuer: Address,
    pub current_address: Address,
    pub current_priv_key: PrivateKey,
    pub current_storage_key: HomomorphicKey,
}

/// Whether `NovationInit`/`NovationStop` have been invoked during this call,
/// tracked purely for observability — the side-graph gate itself is driven
/// by `EvalState::side_lock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideState {
    None,
    Init,
    Stopped,
}

/// Mutable state threaded through one method evaluation.
#[derive(Debug, Clone)]
pub struct EvalState {
    pub global_storage: Storage,
    pub temp_storage: Storage,
    pub local_storage: BTreeMap<Address, Storage>,
    pub graph_state: GraphState,
    pub side_state: SideState,
    /// `Some((lock_start, lock_timeout_end))` while the side-graph lock is
    /// held; released once `current_timestamp` passes `lock_timeout_end`.
    pub side_lock: Option<(i64, i64)>,
    pub world: World,
    pub deltas: DeltaLog,
}

impl EvalState {
    fn local_get(&self, counterparty: &Address, name: &str) -> Option<Value> {
        self.local_storage.get(counterparty)?.get(name).cloned()
    }

    fn local_put(&mut self, counterparty: &Address, name: &str, value: Value) {
        self.local_storage
            .entry(counterparty.clone())
            .or_insert_with(Storage::new)
            .put(name.to_owned(), value);
    }
}

/// Binds a call context and state to a script and evaluates one method call
/// at a time.
pub struct Evaluator<'a> {
    pub ctx: EvalCtx,
    pub state: EvalState,
    script: &'a Script,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalCtx, state: EvalState, script: &'a Script) -> Self {
        Self { ctx, state, script }
    }

    /// Terminal gate, checked ahead of arity: a terminated contract never
    /// evaluates anything at all, not even a badly-shaped call.
    pub fn eval_method(&mut self, method_name: &str, args: Vec<Value>) -> Result<Value, EvalFail> {
        let method = self
            .script
            .methods
            .get(method_name)
            .ok_or_else(|| EvalFail::NoSuchMethod(method_name.to_owned()))?;

        if self.state.graph_state == GraphState::Terminal {
            return Err(EvalFail::TerminalState);
        }
        if method.args.len() != args.len() || method.args.len() > crate::config::MAX_METHOD_ARITY {
            return Err(EvalFail::MethodArityError);
        }
        self.check_side_graph(method)?;
        self.check_graph(method)?;

        for (name, value) in method.args.iter().zip(args) {
            self.state.temp_storage.put(name.clone(), value);
        }
        let body = method.body.clone();
        self.eval_expr(&body)
    }

    fn check_side_graph(&mut self, method: &crate::script::Method) -> Result<(), EvalFail> {
        if let Some((_start, lock_end)) = self.state.side_lock {
            if self.ctx.current_timestamp > lock_end {
                self.state.side_lock = None;
            } else if !matches!(method.tag, MethodTag::Subgraph) {
                return Err(EvalFail::SubgraphLock);
            }
        }
        Ok(())
    }

    fn check_graph(&self, method: &crate::script::Method) -> Result<(), EvalFail> {
        if let MethodTag::Main(label) = &method.tag {
            let required = GraphState::from_tag(label);
            if self.state.graph_state != required {
                return Err(EvalFail::InvalidState);
            }
        }
        Ok(())
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalFail> {
        match expr {
            Expr::Seq(a, b) => {
                self.eval_expr(a)?;
                self.eval_expr(b)
            }
            Expr::Ret(a) => self.eval_expr(a),
            Expr::NoOp => Ok(Value::Void),
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Var(name) => self.eval_var(name),
            Expr::Assign(lhs, rhs) => self.eval_assign(lhs, rhs),
            Expr::UnOp(UnOp::Not, e) => match self.eval_expr(e)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                _ => Err(EvalFail::Impossible),
            },
            Expr::BinOp(op, l, r) => {
                let lv = self.eval_expr(l)?;
                let rv = self.eval_expr(r)?;
                self.eval_binop(*op, lv, rv)
            }
            Expr::Call(prim, args) => self.eval_call(prim, args),
            Expr::If(c, t, e) => match self.eval_expr(c)? {
                Value::Bool(true) => self.eval_expr(t),
                Value::Bool(false) => self.eval_expr(e),
                _ => Err(EvalFail::Impossible),
            },
            Expr::Before(dt_expr, body) => {
                let dt = as_datetime(self.eval_expr(dt_expr)?)?;
                if self.ctx.current_timestamp < dt.0 {
                    self.eval_expr(body)
                } else {
                    Ok(Value::Void)
                }
            }
            Expr::After(dt_expr, body) => {
                let dt = as_datetime(self.eval_expr(dt_expr)?)?;
                if self.ctx.current_timestamp > dt.0 {
                    self.eval_expr(body)
                } else {
                    Ok(Value::Void)
                }
            }
            Expr::Between(s_expr, e_expr, body) => {
                let s = as_datetime(self.eval_expr(s_expr)?)?;
                let e = as_datetime(self.eval_expr(e_expr)?)?;
                let now = self.ctx.current_timestamp;
                if now >= s.0 && now < e.0 {
                    self.eval_expr(body)
                } else {
                    Ok(Value::Void)
                }
            }
        }
    }

    /// Variable resolution order: global storage, then temp storage.
    /// Locals are never read through plain `Var` lookup outside the
    /// local-delta submachine — a bare reference to an undeclared-global,
    /// undeclared-temp local name is `LocalVarNotFound`.
    fn eval_var(&self, name: &str) -> Result<Value, EvalFail> {
        if let Some(v) = self.state.global_storage.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.state.temp_storage.get(name) {
            return Ok(v.clone());
        }
        if self.script.is_local(name) {
            let counterparty = self.ctx.current_tx_issuer.clone();
            return self
                .state
                .local_get(&counterparty, name)
                .ok_or_else(|| EvalFail::LocalVarNotFound(name.to_owned()));
        }
        Err(EvalFail::Impossible)
    }

    fn eval_assign(&mut self, lhs: &str, rhs: &Expr) -> Result<Value, EvalFail> {
        if lhs.len() > crate::config::MAX_STORAGE_KEY_LEN {
            return Err(EvalFail::HugeString);
        }
        if self.script.is_global(lhs) {
            let v = self.eval_expr(rhs)?;
            self.state.global_storage.put(lhs.to_owned(), v.clone());
            self.state.deltas.push(Delta::ModifyGlobal(lhs.to_owned(), v));
            Ok(Value::Void)
        } else if self.script.is_local(lhs) {
            self.eval_local_assign(lhs, rhs)
        } else {
            let v = self.eval_expr(rhs)?;
            self.state.temp_storage.put(lhs.to_owned(), v);
            Ok(Value::Void)
        }
    }

    /// The local-delta submachine: a local assignment must take one of two
    /// shapes so a counterparty who only observes their own private storage
    /// can replay it without seeing anyone else's values.
    fn eval_local_assign(&mut self, lhs: &str, rhs: &Expr) -> Result<Value, EvalFail> {
        let counterparty = self.ctx.current_tx_issuer.clone();
        match rhs {
            Expr::Var(y) if self.script.is_local(y) => {
                let current = self
                    .state
                    .local_get(&counterparty, y)
                    .ok_or_else(|| EvalFail::LocalVarNotFound(y.clone()))?;
                self.state.local_put(&counterparty, lhs, current);
                self.state
                    .deltas
                    .push(Delta::ModifyLocal(lhs.to_owned(), crate::delta::LocalOp::ReplaceWith(y.clone())));
                Ok(Value::Void)
            }
            Expr::BinOp(op, l, r) if expr_is_var(l, lhs) || expr_is_var(r, lhs) => {
                let current = self
                    .state
                    .local_get(&counterparty, lhs)
                    .ok_or_else(|| EvalFail::LocalVarNotFound(lhs.to_owned()))?;
                let lhs_is_left = expr_is_var(l, lhs);
                let other_expr = if lhs_is_left { r.as_ref() } else { l.as_ref() };
                let other = self.eval_expr(other_expr)?;
                let new_value = if lhs_is_left {
                    self.eval_binop(*op, current, other.clone())?
                } else {
                    self.eval_binop(*op, other.clone(), current)?
                };
                self.state.local_put(&counterparty, lhs, new_value);
                let tag = binop_to_delta_tag(*op)?;
                self.state
                    .deltas
                    .push(Delta::ModifyLocal(lhs.to_owned(), crate::delta::LocalOp::Op(tag, other)));
                Ok(Value::Void)
            }
            _ => Err(EvalFail::Impossible),
        }
    }

    fn eval_binop(&self, op: BinOp, l: Value, r: Value) -> Result<Value, EvalFail> {
        use BinOp::*;
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => int_binop(op, a, b),
            (Value::Float(a), Value::Float(b)) => float_binop(op, a, b),
            (Value::Fixed(pa, a), Value::Fixed(pb, b)) if pa == pb => fixed_binop(op, pa, a, b),
            (Value::Bool(a), Value::Bool(b)) => bool_binop(op, a, b),
            (Value::Msg(a), Value::Msg(b)) => msg_binop(op, a, b),
            (Value::DateTime(a), Value::DateTime(b)) => datetime_datetime_binop(op, a, b),
            (Value::DateTime(a), Value::TimeDelta(b)) => datetime_timedelta_binop(op, a, b),
            (Value::TimeDelta(a), Value::TimeDelta(b)) => timedelta_timedelta_binop(op, a, b),
            (Value::TimeDelta(a), Value::Int(b)) if op == Mul => {
                a.0.checked_mul(b).map(|v| Value::TimeDelta(TimeDelta(v))).ok_or(EvalFail::Overflow)
            }
            (Value::Int(a), Value::TimeDelta(b)) if op == Mul => {
                b.0.checked_mul(a).map(|v| Value::TimeDelta(TimeDelta(v))).ok_or(EvalFail::Overflow)
            }
            (Value::Account(a), Value::Account(b))
            | (Value::Asset(a), Value::Asset(b))
            | (Value::Contract(a), Value::Contract(b))
            | (Value::Address(a), Value::Address(b)) => reference_eq_binop(op, &a, &b),
            (Value::Crypto(a), Value::Crypto(b)) => crypto_crypto_binop(op, &a, &b, &self.ctx.current_storage_key),
            (Value::Crypto(a), Value::Int(b)) if op == Mul => {
                self.ctx.current_storage_key.mul_scalar(&a, b).map(Value::Crypto)
            }
            (Value::Int(a), Value::Crypto(b)) if op == Mul => {
                self.ctx.current_storage_key.mul_scalar(&b, a).map(Value::Crypto)
            }
            _ => Err(EvalFail::Impossible),
        }
    }

    fn eval_call(&mut self, prim: &Prim, arg_exprs: &[Expr]) -> Result<Value, EvalFail> {
        match prim {
            Prim::Terminate => {
                let msg = as_msg(self.eval_expr(&arg_exprs[0])?)?;
                self.state.graph_state = GraphState::Terminal;
                self.state.deltas.push(Delta::ModifyState(GraphState::Terminal));
                self.state.deltas.push(Delta::Terminate(msg));
                Ok(Value::Void)
            }
            Prim::Transition(label) => {
                let new_state = GraphState::from_tag(label);
                self.state.graph_state = new_state.clone();
                self.state.deltas.push(Delta::ModifyState(new_state));
                Ok(Value::Void)
            }
            Prim::CurrentState => Ok(Value::State(self.state.graph_state.clone())),
            Prim::NovationInit => {
                let timeout = as_timedelta_micros(self.eval_expr(&arg_exprs[0])?)?;
                let now = self.ctx.current_timestamp;
                let lock_end = now.checked_add(timeout).ok_or(EvalFail::Overflow)?;
                self.state.side_lock = Some((now, lock_end));
                self.state.side_state = SideState::Init;
                Ok(Value::Void)
            }
            Prim::NovationStop => {
                self.state.side_state = SideState::Stopped;
                Ok(Value::Void)
            }
            Prim::TransferTo => {
                let asset = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let amount = as_int(self.eval_expr(&arg_exprs[1])?)?;
                let from = self.ctx.current_tx_issuer.clone();
                let to = self.ctx.current_address.clone();
                self.state
                    .world
                    .transfer_asset(&asset, &from, &to, amount)
                    .map_err(|_| EvalFail::AssetIntegrity)?;
                self.state.deltas.push(Delta::ModifyAsset(AssetMove::TransferTo { asset, amount }));
                Ok(Value::Void)
            }
            Prim::TransferFrom => {
                let asset = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let amount = as_int(self.eval_expr(&arg_exprs[1])?)?;
                let to = as_address_like(&self.eval_expr(&arg_exprs[2])?)?.clone();
                let from = self.ctx.current_address.clone();
                self.state
                    .world
                    .transfer_asset(&asset, &from, &to, amount)
                    .map_err(|_| EvalFail::AssetIntegrity)?;
                self.state
                    .deltas
                    .push(Delta::ModifyAsset(AssetMove::TransferFrom { asset, amount, to }));
                Ok(Value::Void)
            }
            Prim::TransferHoldings => {
                let from = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let asset = as_address_like(&self.eval_expr(&arg_exprs[1])?)?.clone();
                let amount = as_int(self.eval_expr(&arg_exprs[2])?)?;
                let to = as_address_like(&self.eval_expr(&arg_exprs[3])?)?.clone();
                self.state
                    .world
                    .transfer_asset(&asset, &from, &to, amount)
                    .map_err(|_| EvalFail::AssetIntegrity)?;
                self.state
                    .deltas
                    .push(Delta::ModifyAsset(AssetMove::TransferHoldings { asset, amount, from, to }));
                Ok(Value::Void)
            }
            Prim::Now => Ok(Value::DateTime(DateTime(self.ctx.current_timestamp))),
            Prim::Block => Ok(Value::Address(self.ctx.current_block.clone())),
            Prim::Deployer => Ok(Value::Account(self.ctx.current_deployer.clone())),
            Prim::Sender => Ok(Value::Account(self.ctx.current_tx_issuer.clone())),
            Prim::Created => Ok(Value::DateTime(DateTime(self.ctx.current_created))),
            Prim::Address => Ok(Value::Address(self.ctx.current_address.clone())),
            Prim::Validator => Ok(Value::Account(self.ctx.current_validator.clone())),
            Prim::Sign => {
                let msg = as_msg(self.eval_expr(&arg_exprs[0])?)?;
                Ok(Value::Sig(crypto::sign(&self.ctx.current_priv_key, &msg)))
            }
            Prim::Verify => {
                let account = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let sig = as_sig(self.eval_expr(&arg_exprs[1])?)?;
                let msg = as_msg(self.eval_expr(&arg_exprs[2])?)?;
                let public_key = self
                    .state
                    .world
                    .lookup_account(&account)
                    .map_err(|_| EvalFail::AccountIntegrity)?
                    .public_key
                    .clone();
                Ok(Value::Bool(crypto::verify(&public_key, &sig, &msg)))
            }
            Prim::Sha256 => {
                let value = self.eval_expr(&arg_exprs[0])?;
                let digest = hash_value(&value)?;
                Ok(Value::Msg(digest.to_vec()))
            }
            Prim::TxHash => Ok(Value::Msg(self.ctx.current_transaction.clone())),
            Prim::AccountExists => {
                let addr = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                Ok(Value::Bool(self.state.world.accounts.contains_key(&addr)))
            }
            Prim::AssetExists => {
                let addr = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                Ok(Value::Bool(self.state.world.assets.contains_key(&addr)))
            }
            Prim::ContractExists => {
                let addr = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                Ok(Value::Bool(self.state.world.contracts.contains_key(&addr)))
            }
            Prim::ContractValue => {
                let addr = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let name = String::from_utf8(as_msg(self.eval_expr(&arg_exprs[1])?)?)
                    .map_err(|_| EvalFail::ContractIntegrity)?;
                let contract = self
                    .state
                    .world
                    .lookup_contract(&addr)
                    .map_err(|_| EvalFail::ContractIntegrity)?;
                contract.global_storage.get(&name).cloned().ok_or(EvalFail::ContractIntegrity)
            }
            Prim::ContractValueExists => {
                let addr_value = self.eval_expr(&arg_exprs[0])?;
                let name_value = self.eval_expr(&arg_exprs[1])?;
                let exists = (|| -> Result<bool, EvalFail> {
                    let addr = as_address_like(&addr_value)?.clone();
                    let name = String::from_utf8(as_msg(name_value.clone())?).map_err(|_| EvalFail::ContractIntegrity)?;
                    let contract = self
                        .state
                        .world
                        .lookup_contract(&addr)
                        .map_err(|_| EvalFail::ContractIntegrity)?;
                    Ok(contract.global_storage.contains(&name))
                })()
                .unwrap_or(false);
                Ok(Value::Bool(exists))
            }
            Prim::ContractState => {
                let addr = as_address_like(&self.eval_expr(&arg_exprs[0])?)?.clone();
                let contract = self
                    .state
                    .world
                    .lookup_contract(&addr)
                    .map_err(|_| EvalFail::ContractIntegrity)?;
                Ok(Value::State(contract.graph_state.clone()))
            }
            Prim::IsBusinessDayUk => {
                let dt = as_datetime(self.eval_expr(&arg_exprs[0])?)?;
                Ok(Value::Bool(calendar::is_business_day_uk(dt)))
            }
            Prim::IsBusinessDayNyse => {
                let dt = as_datetime(self.eval_expr(&arg_exprs[0])?)?;
                Ok(Value::Bool(calendar::is_business_day_nyse(dt)))
            }
            Prim::NextBusinessDayUk => {
                let dt = as_datetime(self.eval_expr(&arg_exprs[0])?)?;
                calendar::next_business_day(dt, calendar::is_business_day_uk)
                    .map(Value::DateTime)
                    .ok_or(EvalFail::Impossible)
            }
            Prim::NextBusinessDayNyse => {
                let dt = as_datetime(self.eval_expr(&arg_exprs[0])?)?;
                calendar::next_business_day(dt, calendar::is_business_day_nyse)
                    .map(Value::DateTime)
                    .ok_or(EvalFail::Impossible)
            }
            Prim::Between => {
                let x = as_datetime(self.eval_expr(&arg_exprs[0])?)?;
                let lo = as_datetime(self.eval_expr(&arg_exprs[1])?)?;
                let hi = as_datetime(self.eval_expr(&arg_exprs[2])?)?;
                Ok(Value::Bool(x.0 >= lo.0 && x.0 < hi.0))
            }
            Prim::FixedToFloat(prec) => match self.eval_expr(&arg_exprs[0])? {
                Value::Fixed(p, scaled) if p == *prec => Ok(Value::Float(fixed_to_float(p, scaled))),
                _ => Err(EvalFail::Impossible),
            },
            Prim::FloatToFixed(prec) => {
                let value = match self.eval_expr(&arg_exprs[0])? {
                    Value::Float(f) => f,
                    _ => return Err(EvalFail::Impossible),
                };
                float_to_fixed(value, *prec)
                    .map(|(p, scaled)| Value::Fixed(p, scaled))
                    .ok_or(EvalFail::Overflow)
            }
        }
    }
}

fn expr_is_var(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Var(n) if n == name)
}

fn binop_to_delta_tag(op: BinOp) -> Result<BinOpTag, EvalFail> {
    match op {
        BinOp::Add => Ok(BinOpTag::Add),
        BinOp::Sub => Ok(BinOpTag::Sub),
        BinOp::Mul => Ok(BinOpTag::Mul),
        BinOp::Div => Ok(BinOpTag::Div),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_msg(v: Value) -> Result<Vec<u8>, EvalFail> {
    match v {
        Value::Msg(b) => Ok(b),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_int(v: Value) -> Result<i64, EvalFail> {
    match v {
        Value::Int(i) => Ok(i),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_address_like(v: &Value) -> Result<&Address, EvalFail> {
    match v {
        Value::Account(a) | Value::Asset(a) | Value::Contract(a) | Value::Address(a) => Ok(a),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_datetime(v: Value) -> Result<DateTime, EvalFail> {
    match v {
        Value::DateTime(dt) => Ok(dt),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_sig(v: Value) -> Result<Sig, EvalFail> {
    match v {
        Value::Sig(s) => Ok(s),
        _ => Err(EvalFail::Impossible),
    }
}

fn as_timedelta_micros(v: Value) -> Result<i64, EvalFail> {
    match v {
        Value::TimeDelta(td) => Ok(td.0),
        Value::Int(i) => Ok(i),
        _ => Err(EvalFail::Impossible),
    }
}

fn int_binop(op: BinOp, a: i64, b: i64) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => Value::Int(a.checked_add(b).ok_or(EvalFail::Overflow)?),
        Sub => Value::Int(a.checked_sub(b).ok_or(EvalFail::Underflow)?),
        Mul => Value::Int(a.checked_mul(b).ok_or(EvalFail::Overflow)?),
        Div => Value::Int(a.checked_div(b).ok_or(EvalFail::DivideByZero)?),
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        And | Or => return Err(EvalFail::Impossible),
    })
}

fn float_binop(op: BinOp, a: f64, b: f64) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => Value::Float(a + b),
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div => {
            if b == 0.0 {
                return Err(EvalFail::DivideByZero);
            }
            Value::Float(a / b)
        }
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        And | Or => return Err(EvalFail::Impossible),
    })
}

fn fixed_binop(op: BinOp, prec: Precision, a: i64, b: i64) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => Value::Fixed(prec, a.checked_add(b).ok_or(EvalFail::Overflow)?),
        Sub => Value::Fixed(prec, a.checked_sub(b).ok_or(EvalFail::Underflow)?),
        Mul => Value::Fixed(prec, fixed_mul(prec, a, b)?),
        Div => Value::Fixed(prec, fixed_div(prec, a, b)?),
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        And | Or => return Err(EvalFail::Impossible),
    })
}

/// `a * b`, rescaled back to `prec` decimal places with the same
/// ties-to-even rule `float_to_fixed` uses.
fn fixed_mul(prec: Precision, a: i64, b: i64) -> Result<i64, EvalFail> {
    let factor = i128::from(10_i64.pow(u32::from(prec.get())));
    let product = i128::from(a) * i128::from(b);
    let scaled = round_div_ties_even(product, factor)?;
    i64::try_from(scaled).map_err(|_| EvalFail::Overflow)
}

fn fixed_div(prec: Precision, a: i64, b: i64) -> Result<i64, EvalFail> {
    if b == 0 {
        return Err(EvalFail::DivideByZero);
    }
    let factor = i128::from(10_i64.pow(u32::from(prec.get())));
    let numerator = i128::from(a) * factor;
    let scaled = round_div_ties_even(numerator, i128::from(b))?;
    i64::try_from(scaled).map_err(|_| EvalFail::Overflow)
}

fn round_div_ties_even(numerator: i128, denominator: i128) -> Result<i128, EvalFail> {
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    let twice = remainder * 2;
    let denom_abs = denominator.abs();
    let rounded = if twice > denom_abs {
        quotient + 1
    } else if twice < denom_abs {
        quotient
    } else if quotient % 2 == 0 {
        quotient
    } else {
        quotient + 1
    };
    Ok(rounded)
}

fn bool_binop(op: BinOp, a: bool, b: bool) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        And => Value::Bool(a && b),
        Or => Value::Bool(a || b),
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        _ => return Err(EvalFail::Impossible),
    })
}

fn msg_binop(op: BinOp, a: Vec<u8>, b: Vec<u8>) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => {
            let mut out = a;
            out.extend_from_slice(&b);
            Value::Msg(out)
        }
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        _ => return Err(EvalFail::Impossible),
    })
}

fn reference_eq_binop(op: BinOp, a: &Address, b: &Address) -> Result<Value, EvalFail> {
    use BinOp::*;
    match op {
        Eq => Ok(Value::Bool(a == b)),
        Neq => Ok(Value::Bool(a != b)),
        _ => Err(EvalFail::Impossible),
    }
}

fn datetime_datetime_binop(op: BinOp, a: DateTime, b: DateTime) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        Sub => Value::TimeDelta(TimeDelta(a.0.checked_sub(b.0).ok_or(EvalFail::Underflow)?)),
        _ => return Err(EvalFail::Impossible),
    })
}

fn datetime_timedelta_binop(op: BinOp, a: DateTime, b: TimeDelta) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => Value::DateTime(DateTime(a.0.checked_add(b.0).ok_or(EvalFail::Overflow)?)),
        Sub => Value::DateTime(DateTime(a.0.checked_sub(b.0).ok_or(EvalFail::Underflow)?)),
        _ => return Err(EvalFail::Impossible),
    })
}

fn timedelta_timedelta_binop(op: BinOp, a: TimeDelta, b: TimeDelta) -> Result<Value, EvalFail> {
    use BinOp::*;
    Ok(match op {
        Add => Value::TimeDelta(TimeDelta(a.0.checked_add(b.0).ok_or(EvalFail::Overflow)?)),
        Sub => Value::TimeDelta(TimeDelta(a.0.checked_sub(b.0).ok_or(EvalFail::Underflow)?)),
        Eq => Value::Bool(a == b),
        Neq => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Gt => Value::Bool(a > b),
        Le => Value::Bool(a <= b),
        Ge => Value::Bool(a >= b),
        _ => return Err(EvalFail::Impossible),
    })
}

fn crypto_crypto_binop(op: BinOp, a: &Ciphertext, b: &Ciphertext, key: &HomomorphicKey) -> Result<Value, EvalFail> {
    use BinOp::*;
    match op {
        Add => key.add(a, b).map(Value::Crypto),
        Sub => key.sub(a, b).map(Value::Crypto),
        _ => Err(EvalFail::Impossible),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::crypto::PrivateKey;
    use crate::script::Method;

    fn ctx() -> EvalCtx {
        EvalCtx {
            current_block: Address::new(vec![0]),
            current_validator: Address::new(vec![0xAA]),
            current_transaction: vec![1, 2, 3],
            current_timestamp: 1_000_000,
            current_created: 0,
            current_deployer: Address::new(vec![0xD]),
            current_tx_issuer: Address::new(vec![0xE]),
            current_address: Address::new(vec![0xC]),
            current_priv_key: PrivateKey::from_bytes(&[7; 32]),
            current_storage_key: HomomorphicKey::derive(&Address::new(vec![0xC])),
        }
    }

    fn state() -> EvalState {
        EvalState {
            global_storage: Storage::new(),
            temp_storage: Storage::new(),
            local_storage: BTreeMap::new(),
            graph_state: GraphState::Initial,
            side_state: SideState::None,
            side_lock: None,
            world: World::new(),
            deltas: Vec::new(),
        }
    }

    fn counter_script() -> Script {
        let mut globals = BTreeSet::new();
        globals.insert("count".to_owned());
        let mut methods = BTreeMap::new();
        methods.insert(
            "increment".to_owned(),
            Method {
                name: "increment".to_owned(),
                args: vec![],
                tag: MethodTag::Main("initial".to_owned()),
                body: Expr::Seq(
                    Box::new(Expr::Assign(
                        "count".to_owned(),
                        Box::new(Expr::BinOp(BinOp::Add, Box::new(Expr::Var("count".to_owned())), Box::new(Expr::Lit(Value::Int(1))))),
                    )),
                    Box::new(Expr::Ret(Box::new(Expr::Var("count".to_owned())))),
                ),
            },
        );
        methods.insert(
            "end".to_owned(),
            Method {
                name: "end".to_owned(),
                args: vec![],
                tag: MethodTag::Main("initial".to_owned()),
                body: Expr::Call(Prim::Terminate, vec![Expr::Lit(Value::Msg(b"done".to_vec()))]),
            },
        );
        Script { globals, locals: BTreeSet::new(), methods }
    }

    #[test]
    fn increment_emits_modify_global_delta() {
        let script = counter_script();
        let mut ev = Evaluator::new(ctx(), state(), &script);
        ev.state.global_storage.put("count", Value::Int(0));
        let result = ev.eval_method("increment", vec![]).unwrap();
        assert_eq!(result, Value::Int(1));
        assert_eq!(ev.state.deltas.len(), 1);
        assert!(matches!(&ev.state.deltas[0], Delta::ModifyGlobal(name, Value::Int(1)) if name == "count"));
    }

    #[test]
    fn terminate_then_call_fails_terminal_state() {
        let script = counter_script();
        let mut ev = Evaluator::new(ctx(), state(), &script);
        ev.state.global_storage.put("count", Value::Int(0));
        ev.eval_method("end", vec![]).unwrap();
        assert_eq!(ev.state.graph_state, GraphState::Terminal);
        let err = ev.eval_method("increment", vec![]).unwrap_err();
        assert_eq!(err, EvalFail::TerminalState);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let script = counter_script();
        let mut ev = Evaluator::new(ctx(), state(), &script);
        let err = ev.eval_method("increment", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err, EvalFail::MethodArityError);
    }

    #[test]
    fn wrong_graph_state_is_rejected() {
        let script = counter_script();
        let mut st = state();
        st.graph_state = GraphState::Label("funded".to_owned());
        let mut ev = Evaluator::new(ctx(), st, &script);
        let err = ev.eval_method("increment", vec![]).unwrap_err();
        assert_eq!(err, EvalFail::InvalidState);
    }

    #[test]
    fn divide_by_zero_is_rejected() {
        let empty_script = Script { globals: BTreeSet::new(), locals: BTreeSet::new(), methods: BTreeMap::new() };
        let ev = Evaluator::new(ctx(), state(), &empty_script);
        let err = ev.eval_binop(BinOp::Div, Value::Int(10), Value::Int(0)).unwrap_err();
        assert_eq!(err, EvalFail::DivideByZero);
    }

    #[test]
    fn msg_plus_is_concatenation_and_ordering_is_byte_lexicographic() {
        let empty_script = Script { globals: BTreeSet::new(), locals: BTreeSet::new(), methods: BTreeMap::new() };
        let ev = Evaluator::new(ctx(), state(), &empty_script);
        let a = Value::Msg(b"ab".to_vec());
        let b = Value::Msg(b"b".to_vec());
        let got = ev.eval_binop(BinOp::Add, a.clone(), b.clone()).unwrap();
        assert_eq!(got, Value::Msg(b"abb".to_vec()));
        assert_eq!(ev.eval_binop(BinOp::Lt, a.clone(), b.clone()).unwrap(), Value::Bool(true));
        assert_eq!(ev.eval_binop(BinOp::Gt, a.clone(), b.clone()).unwrap(), Value::Bool(false));
        assert_eq!(ev.eval_binop(BinOp::Le, a.clone(), a.clone()).unwrap(), Value::Bool(true));
        assert_eq!(ev.eval_binop(BinOp::Ge, b, a).unwrap(), Value::Bool(true));
    }

    #[test]
    fn fixed_multiplication_rescales_with_ties_to_even() {
        let prec = Precision::new(2).unwrap();
        // 1.25 * 2.00 = 2.5000 -> rescaled to 2 places as 2.50, exact.
        let got = fixed_mul(prec, 125, 200).unwrap();
        assert_eq!(got, 250);
    }

    #[test]
    fn local_self_referential_add_emits_op_delta() {
        let mut globals = BTreeSet::new();
        globals.insert("ignored".to_owned());
        let mut locals = BTreeSet::new();
        locals.insert("balance".to_owned());
        let mut methods = BTreeMap::new();
        methods.insert(
            "credit".to_owned(),
            Method {
                name: "credit".to_owned(),
                args: vec!["amount".to_owned()],
                tag: MethodTag::Main("initial".to_owned()),
                body: Expr::Assign(
                    "balance".to_owned(),
                    Box::new(Expr::BinOp(
                        BinOp::Add,
                        Box::new(Expr::Var("balance".to_owned())),
                        Box::new(Expr::Var("amount".to_owned())),
                    )),
                ),
            },
        );
        let script = Script { globals: BTreeSet::new(), locals, methods };
        let mut ev = Evaluator::new(ctx(), state(), &script);
        let counterparty = ev.ctx.current_tx_issuer.clone();
        ev.state.local_put(&counterparty, "balance", Value::Int(5));
        ev.eval_method("credit", vec![Value::Int(3)]).unwrap();
        assert_eq!(ev.state.local_get(&counterparty, "balance"), Some(Value::Int(8)));
        assert!(matches!(
            &ev.state.deltas[0],
            Delta::ModifyLocal(name, crate::delta::LocalOp::Op(BinOpTag::Add, Value::Int(3))) if name == "balance"
        ));
    }
}
