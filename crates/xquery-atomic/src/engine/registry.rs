//! Function signatures and overload resolution.
//!
//! A call is bound once, at compile time: every signature registered under
//! the name that accepts the arity is scored by its *matching distance*
//! against the static argument types, and the lowest total wins. Ties keep
//! declaration order. The bound [`CompiledCall`] is then evaluated any number
//! of times.
use core::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use crate::engine::collation::{Collation, resolve_collation};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::xdm::compare::CompareContext;
use crate::xdm::{AtomicType, CastContext, ExpandedName, ItemType, Occurrence, SequenceType, XdmAtomicValue, XdmItem, XdmSequenceStream};

/// Distance of an exact type match.
pub const EXACT: u32 = 0;
/// Distance of a subtype substitution.
pub const SUBTYPE: u32 = 1;
/// Distance of a match that needs promotion, atomization or a runtime check.
pub const COERCE: u32 = 2;

/// Opaque state produced at compile time by a signature's prepare hook.
pub type Prepared = Arc<dyn Any + Send + Sync>;

pub type FunctionBody<N> =
    Arc<dyn Fn(&CallCtx<'_, N>, &[XdmSequenceStream<N>]) -> Result<XdmSequenceStream<N>, Error> + Send + Sync>;

/// Compile-time hook, given the literal value (if any) of each argument.
pub type PrepareHook = Arc<dyn Fn(&[Option<XdmAtomicValue>], &StaticContext) -> Result<Option<Prepared>, Error> + Send + Sync>;

fn occurrence_distance(actual: Occurrence, declared: Occurrence) -> u32 {
    use Occurrence as O;
    match (actual, declared) {
        (a, d) if a == d => EXACT,
        (_, O::ZeroOrMore) | (O::ExactlyOne, _) => SUBTYPE,
        _ => COERCE,
    }
}

fn atomic_item_distance(actual: AtomicType, declared: AtomicType) -> Option<u32> {
    if actual == declared {
        Some(EXACT)
    } else if actual.is_subtype_of(declared) {
        Some(SUBTYPE)
    } else if declared.accepts_promotion_from(actual)
        || actual == AtomicType::UntypedAtomic
        || declared.is_subtype_of(actual)
    {
        Some(COERCE)
    } else {
        None
    }
}

fn item_distance(actual: ItemType, declared: ItemType) -> Option<u32> {
    use ItemType as I;
    match (actual, declared) {
        (a, d) if a == d => Some(EXACT),
        (_, I::AnyItem) => Some(SUBTYPE),
        (I::AnyItem, _) => Some(COERCE),
        (I::Empty, _) | (_, I::Empty) => None,
        (I::Node(_), I::Atomic(_) | I::Numeric) => Some(COERCE),
        (I::Node(Some(_)), I::Node(None)) => Some(SUBTYPE),
        (I::Node(None), I::Node(Some(_))) => Some(COERCE),
        (I::Node(_), I::Node(_)) | (I::Atomic(_) | I::Numeric, I::Node(_)) => None,
        (I::Atomic(a), I::Atomic(d)) => atomic_item_distance(a, d),
        (I::Numeric, I::Numeric) => Some(EXACT),
        (I::Atomic(a), I::Numeric) if a.is_numeric() => Some(SUBTYPE),
        (I::Atomic(a), I::Numeric) => {
            matches!(a, AtomicType::UntypedAtomic | AtomicType::AnyAtomic).then_some(COERCE)
        }
        (I::Numeric, I::Atomic(d)) => (d.is_numeric() || d == AtomicType::AnyAtomic).then_some(COERCE),
    }
}

/// Matching distance of one static argument type against a declared
/// parameter type, or `None` when the argument can never be accepted.
pub fn matching_distance(actual: &SequenceType, declared: &SequenceType) -> Option<u32> {
    if actual == declared {
        return Some(EXACT);
    }
    if actual.is_empty_sequence() {
        return declared.occurrence.allows_empty().then_some(SUBTYPE);
    }
    let item = item_distance(actual.item, declared.item)?;
    Some(item.max(occurrence_distance(actual.occurrence, declared.occurrence)))
}

/// One overload of a named function.
pub struct FunctionSignature<N> {
    pub name: ExpandedName,
    pub params: SmallVec<[SequenceType; 4]>,
    /// The last parameter repeats (`fn:concat`).
    pub variadic: bool,
    pub result: SequenceType,
    body: FunctionBody<N>,
    prepare: Option<PrepareHook>,
}

impl<N> FunctionSignature<N> {
    pub fn new(name: ExpandedName, params: &[SequenceType], result: SequenceType, body: FunctionBody<N>) -> Self {
        Self { name, params: params.iter().copied().collect(), variadic: false, result, body, prepare: None }
    }

    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    #[must_use]
    pub fn with_prepare(mut self, hook: PrepareHook) -> Self {
        self.prepare = Some(hook);
        self
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        arity == self.params.len() || (self.variadic && arity >= self.params.len())
    }

    pub fn param(&self, index: usize) -> Option<&SequenceType> {
        self.params.get(index).or_else(|| if self.variadic { self.params.last() } else { None })
    }

    /// Total matching distance, `None` if any argument is rejected.
    pub fn distance(&self, arg_types: &[SequenceType]) -> Option<u32> {
        if !self.accepts_arity(arg_types.len()) {
            return None;
        }
        arg_types.iter().enumerate().try_fold(0u32, |acc, (i, actual)| {
            Some(acc + matching_distance(actual, self.param(i)?)?)
        })
    }

    /// `fn:name#arity` style label used in error locations.
    pub fn label(&self, arity: usize) -> String {
        format!("{}#{arity}", self.name)
    }
}

pub struct FunctionRegistry<N> {
    fns: HashMap<ExpandedName, Vec<Arc<FunctionSignature<N>>>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N: XdmNode> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an overload. Overloads keep registration order.
    pub fn register(&mut self, signature: FunctionSignature<N>) {
        self.fns.entry(signature.name.clone()).or_default().push(Arc::new(signature));
    }

    /// Convenience: register `ns:local(params) as result`.
    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, params: &[SequenceType], result: SequenceType, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<'_, N>, &[XdmSequenceStream<N>]) -> Result<XdmSequenceStream<N>, Error>,
    {
        let name = ExpandedName::new(Some(ns_uri.to_string()), local);
        self.register(FunctionSignature::new(name, params, result, Arc::new(f)));
    }

    pub fn overloads(&self, name: &ExpandedName) -> &[Arc<FunctionSignature<N>>] {
        self.fns.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.fns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    fn effective_name(name: &ExpandedName, static_ctx: &StaticContext) -> ExpandedName {
        match (&name.ns_uri, &static_ctx.default_function_namespace) {
            (None, Some(ns)) => ExpandedName::new(Some(ns.clone()), name.local.clone()),
            _ => name.clone(),
        }
    }

    fn unknown(name: &ExpandedName, arity: usize) -> Error {
        Error::from_code(ErrorCode::XPST0017, format!("no function {name}#{arity}"))
    }

    /// Bind a static call: pick the overload with the least matching distance
    /// and run its prepare hook over the literal arguments.
    ///
    /// `literal_args` holds one entry per argument, `Some` for a constant. A
    /// slice of another length skips the prepare hook.
    pub fn compile_call(
        &self,
        name: &ExpandedName,
        arg_types: &[SequenceType],
        literal_args: &[Option<XdmAtomicValue>],
        static_ctx: &StaticContext,
    ) -> Result<CompiledCall<N>, Error> {
        let name = Self::effective_name(name, static_ctx);
        let mut best: Option<(u32, &Arc<FunctionSignature<N>>)> = None;
        for sig in self.overloads(&name) {
            let Some(d) = sig.distance(arg_types) else {
                continue;
            };
            if best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, sig));
            }
        }
        let Some((distance, sig)) = best else {
            return Err(Self::unknown(&name, arg_types.len()));
        };
        tracing::trace!(function = %sig.label(arg_types.len()), distance, "overload selected");
        let prepared = match &sig.prepare {
            Some(hook) if literal_args.len() == arg_types.len() => {
                hook(literal_args, static_ctx).map_err(|e| e.with_location(sig.label(arg_types.len())))?
            }
            _ => None,
        };
        Ok(CompiledCall {
            signature: Arc::clone(sig),
            arity: arg_types.len(),
            prepared,
            static_ctx: Arc::new(static_ctx.clone()),
        })
    }

    /// Bind a dynamic call with no static types: first overload accepting the
    /// arity.
    pub fn resolve_by_arity(
        &self,
        name: &ExpandedName,
        arity: usize,
        static_ctx: &StaticContext,
    ) -> Result<CompiledCall<N>, Error> {
        let name = Self::effective_name(name, static_ctx);
        let sig = self
            .overloads(&name)
            .iter()
            .find(|s| s.accepts_arity(arity))
            .ok_or_else(|| Self::unknown(&name, arity))?;
        Ok(CompiledCall { signature: Arc::clone(sig), arity, prepared: None, static_ctx: Arc::new(static_ctx.clone()) })
    }
}

/// Decrements the shared call depth when dropped.
struct DepthGuard<'a> {
    depth: &'a std::sync::atomic::AtomicUsize,
}

impl<'a> DepthGuard<'a> {
    fn enter<N>(ctx: &'a DynamicContext<N>, label: &str) -> Result<Self, Error> {
        let depth = ctx.call_depth.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = DepthGuard { depth: &ctx.call_depth };
        if depth > ctx.max_call_depth {
            return Err(ctx.error(
                ErrorCode::XQRT0001,
                Some(label),
                format!("call depth limit of {} exceeded", ctx.max_call_depth),
            ));
        }
        Ok(guard)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A call bound to one overload.
pub struct CompiledCall<N> {
    signature: Arc<FunctionSignature<N>>,
    arity: usize,
    prepared: Option<Prepared>,
    static_ctx: Arc<StaticContext>,
}

impl<N: XdmNode> CompiledCall<N> {
    pub fn signature(&self) -> &FunctionSignature<N> {
        &self.signature
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Run the body with the context item of `ctx` as focus.
    pub fn evaluate(&self, args: &[XdmSequenceStream<N>], ctx: &DynamicContext<N>) -> Result<XdmSequenceStream<N>, Error> {
        self.evaluate_with_focus(args, ctx.context_item.as_ref(), ctx)
    }

    pub fn evaluate_with_focus(
        &self,
        args: &[XdmSequenceStream<N>],
        focus: Option<&XdmItem<N>>,
        ctx: &DynamicContext<N>,
    ) -> Result<XdmSequenceStream<N>, Error> {
        let label = self.signature.label(self.arity);
        if args.len() != self.arity {
            return Err(ctx.error(
                ErrorCode::XPST0017,
                Some(&label),
                format!("called with {} arguments", args.len()),
            ));
        }
        let _guard = DepthGuard::enter(ctx, &label)?;
        let call = CallCtx {
            dyn_ctx: ctx,
            static_ctx: &self.static_ctx,
            focus,
            prepared: self.prepared.as_deref(),
            label: &label,
        };
        (self.signature.body)(&call, args).map_err(|e| if e.location.is_some() { e } else { e.with_location(label.clone()) })
    }
}

/// What a function body sees of its environment.
pub struct CallCtx<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    pub static_ctx: &'a StaticContext,
    pub focus: Option<&'a XdmItem<N>>,
    prepared: Option<&'a (dyn Any + Send + Sync)>,
    label: &'a str,
}

impl<'a, N: XdmNode> CallCtx<'a, N> {
    /// A standalone context, for calling bodies outside a compiled call.
    pub fn new(dyn_ctx: &'a DynamicContext<N>, static_ctx: &'a StaticContext) -> Self {
        Self { dyn_ctx, static_ctx, focus: dyn_ctx.context_item.as_ref(), prepared: None, label: "" }
    }

    /// Located error for the current call.
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> Error {
        let location = (!self.label.is_empty()).then_some(self.label);
        self.dyn_ctx.error(code, location, message)
    }

    /// Compile-time state of type `T`, if the prepare hook produced one.
    pub fn prepared<T: Any>(&self) -> Option<&T> {
        self.prepared.and_then(|p| p.downcast_ref::<T>())
    }

    /// Default collation URI: the dynamic override, then the static one.
    pub fn default_collation_uri(&self) -> Option<&str> {
        self.dyn_ctx.default_collation.as_deref().or(self.static_ctx.default_collation.as_deref())
    }

    /// Collation named by an optional argument, else the default.
    pub fn collation(&self, uri: Option<&str>) -> Result<Arc<dyn Collation>, Error> {
        resolve_collation(&self.dyn_ctx.collations, self.default_collation_uri(), uri)
            .map_err(|e| self.error(e.code_enum(), e.message))
    }

    pub fn compare_context(&self, uri: Option<&str>) -> Result<CompareContext, Error> {
        Ok(self.dyn_ctx.compare_context(self.collation(uri)?))
    }

    pub fn cast_context(&self) -> CastContext<'_> {
        self.static_ctx.cast_context(self.dyn_ctx.strict_observance)
    }

    /// The focus item, `err:XPDY0002` when absent.
    pub fn require_focus(&self) -> Result<&'a XdmItem<N>, Error> {
        self.focus.ok_or_else(|| self.error(ErrorCode::XPDY0002, "context item is undefined"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AtomicType as T;

    #[test]
    fn distances_rank_exact_subtype_coercion() {
        let int = SequenceType::one(T::Integer);
        assert_eq!(matching_distance(&int, &int), Some(EXACT));
        assert_eq!(matching_distance(&SequenceType::one(T::Short), &int), Some(SUBTYPE));
        assert_eq!(matching_distance(&int, &SequenceType::one(T::Double)), Some(COERCE));
        assert_eq!(matching_distance(&SequenceType::one(T::UntypedAtomic), &int), Some(COERCE));
        assert_eq!(matching_distance(&SequenceType::one(T::Boolean), &int), None);
        assert_eq!(matching_distance(&SequenceType::EMPTY, &SequenceType::opt(T::String)), Some(SUBTYPE));
        assert_eq!(matching_distance(&SequenceType::EMPTY, &SequenceType::one(T::String)), None);
        assert_eq!(matching_distance(&SequenceType::star(T::String), &SequenceType::opt(T::String)), Some(COERCE));
    }
}
