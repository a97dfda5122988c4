use std::sync::Arc;

use super::common::{FnResult, boolean, maybe_string, opt_string, string};
use crate::engine::regex::{CompiledRegex, ReplacementTemplate};
use crate::engine::registry::{CallCtx, PrepareHook, Prepared};
use crate::engine::runtime::{Error, StaticContext};
use crate::model::XdmNode;
use crate::xdm::lexical::collapse_xml_whitespace;
use crate::xdm::{XdmAtomicValue, XdmSequenceStream};

/// Compile-time hook: when the pattern and (if passed) the flags are literals,
/// compile once and keep the result with the bound call.
pub(super) fn precompile(pattern_index: usize, flags_index: usize) -> PrepareHook {
    Arc::new(move |literals: &[Option<XdmAtomicValue>], _static_ctx: &StaticContext| {
        let literal = |i: usize| literals.get(i).and_then(Option::as_ref).and_then(XdmAtomicValue::string_like);
        let Some(pattern) = literal(pattern_index) else {
            return Ok(None);
        };
        let flags = match literals.get(flags_index) {
            None => "",
            Some(_) => match literal(flags_index) {
                Some(f) => f,
                None => return Ok(None),
            },
        };
        let compiled = Arc::new(CompiledRegex::compile(pattern, flags)?);
        tracing::debug!(pattern, flags, "regex precompiled");
        Ok(Some(Arc::new(compiled) as Prepared))
    })
}

fn regex_for<N: XdmNode>(
    ctx: &CallCtx<'_, N>,
    args: &[XdmSequenceStream<N>],
    pattern_index: usize,
    flags_index: usize,
) -> Result<Arc<CompiledRegex>, Error> {
    if let Some(compiled) = ctx.prepared::<Arc<CompiledRegex>>() {
        return Ok(Arc::clone(compiled));
    }
    let pattern = opt_string(ctx, &args[pattern_index], pattern_index + 1)?;
    let flags = match args.get(flags_index) {
        Some(f) => opt_string(ctx, f, flags_index + 1)?,
        None => String::new(),
    };
    ctx.dyn_ctx.regex_cache.get_or_compile(&pattern, &flags)
}

pub(super) fn matches_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let input = opt_string(ctx, &args[0], 1)?;
    let regex = regex_for(ctx, args, 1, 2)?;
    Ok(boolean(regex.is_match(&input)?))
}

pub(super) fn replace_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let input = opt_string(ctx, &args[0], 1)?;
    let regex = regex_for(ctx, args, 1, 3)?;
    let replacement = opt_string(ctx, &args[2], 3)?;
    let template = ReplacementTemplate::parse(&replacement, regex.group_count())?;
    Ok(string(regex.replace(&input, &template)?))
}

pub(super) fn tokenize_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(input) = maybe_string(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    if args.len() == 1 {
        let collapsed = collapse_xml_whitespace(&input);
        return Ok(XdmSequenceStream::from_atomics(
            collapsed.split(' ').filter(|t| !t.is_empty()).map(XdmAtomicValue::string),
        ));
    }
    let regex = regex_for(ctx, args, 1, 2)?;
    Ok(XdmSequenceStream::from_atomics(regex.tokenize(&input)?.into_iter().map(XdmAtomicValue::string)))
}
