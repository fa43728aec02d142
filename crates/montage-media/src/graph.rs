//! Typed filter-graph representation.
//!
//! Compositing code builds a [`FilterGraph`] of chains, filters and named
//! pads. Numeric parameters that vary over time are [`Expr`] trees, so the
//! math can be evaluated and tested without going through FFmpeg's textual
//! syntax. Serialization to `-filter_complex` happens last.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Stream selector on an encoder input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// An edge endpoint: either an input stream or a named intermediate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pad {
    Stream { input: usize, kind: StreamKind },
    Label(String),
}

impl Pad {
    pub fn video(input: usize) -> Self {
        Pad::Stream {
            input,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(input: usize) -> Self {
        Pad::Stream {
            input,
            kind: StreamKind::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Pad::Label(name.into())
    }

    /// Value for `-map`.
    pub fn map_arg(&self) -> String {
        match self {
            Pad::Stream { input, kind } => format!("{}:{}", input, kind.as_str()),
            Pad::Label(name) => format!("[{}]", name),
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Stream { input, kind } => write!(f, "[{}:{}]", input, kind.as_str()),
            Pad::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// Which spelling of the time variable a filter understands.
///
/// Most filters use `t`; `blend` and `geq` use `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeVar {
    Lower,
    Upper,
}

impl TimeVar {
    fn as_str(&self) -> &'static str {
        match self {
            TimeVar::Lower => "t",
            TimeVar::Upper => "T",
        }
    }
}

/// Arithmetic expression in FFmpeg's expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// Stream time in seconds.
    Time,
    /// Filter-specific variable (`W`, `overlay_w`, `X`, ...).
    Var(&'static str),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// Built-in function call (`if`, `lt`, `clip`, ...).
    Call(&'static str, Vec<Expr>),
}

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn time() -> Self {
        Expr::Time
    }

    pub fn var(name: &'static str) -> Self {
        Expr::Var(name)
    }

    pub fn call(name: &'static str, args: Vec<Expr>) -> Self {
        Expr::Call(name, args)
    }

    /// `if(cond, then, else)`, folded when the condition is constant.
    pub fn if_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        match cond.as_const() {
            Some(c) if c != 0.0 => then,
            Some(_) => otherwise,
            None if then == otherwise => then,
            None => Expr::call("if", vec![cond, then, otherwise]),
        }
    }

    pub fn lt(a: Expr, b: Expr) -> Self {
        Self::fold2("lt", a, b, |x, y| bool_num(x < y))
    }

    pub fn lte(a: Expr, b: Expr) -> Self {
        Self::fold2("lte", a, b, |x, y| bool_num(x <= y))
    }

    pub fn gte(a: Expr, b: Expr) -> Self {
        Self::fold2("gte", a, b, |x, y| bool_num(x >= y))
    }

    pub fn eq(a: Expr, b: Expr) -> Self {
        Self::fold2("eq", a, b, |x, y| bool_num(x == y))
    }

    pub fn min(a: Expr, b: Expr) -> Self {
        Self::fold2("min", a, b, f64::min)
    }

    pub fn max(a: Expr, b: Expr) -> Self {
        Self::fold2("max", a, b, f64::max)
    }

    /// `clip(x, lo, hi)`.
    pub fn clip(x: Expr, lo: f64, hi: f64) -> Self {
        match x.as_const() {
            Some(v) => Expr::Const(v.clamp(lo, hi)),
            None => Expr::call("clip", vec![x, Expr::Const(lo), Expr::Const(hi)]),
        }
    }

    /// `between(x, lo, hi)`, inclusive.
    pub fn between(x: Expr, lo: f64, hi: f64) -> Self {
        match x.as_const() {
            Some(v) => Expr::Const(bool_num(v >= lo && v <= hi)),
            None => Expr::call("between", vec![x, Expr::Const(lo), Expr::Const(hi)]),
        }
    }

    /// `a + (b - a) * p`.
    pub fn lerp(a: f64, b: f64, p: Expr) -> Self {
        Expr::Const(a) + Expr::Const(b - a) * p
    }

    /// Linear 0→1 ramp over `[start, start + duration]`, clamped outside.
    pub fn ramp(time: Expr, start: f64, duration: f64) -> Self {
        if duration <= 0.0 {
            return Expr::gte(time, Expr::Const(start));
        }
        Expr::clip((time - start) / duration, 0.0, 1.0)
    }

    fn fold2(name: &'static str, a: Expr, b: Expr, f: impl Fn(f64, f64) -> f64) -> Self {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(f(x, y)),
            _ => Expr::call(name, vec![a, b]),
        }
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    /// Whether the value changes over time.
    pub fn depends_on_time(&self) -> bool {
        match self {
            Expr::Time => true,
            Expr::Const(_) | Expr::Var(_) => false,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.depends_on_time() || b.depends_on_time()
            }
            Expr::Call(_, args) => args.iter().any(Expr::depends_on_time),
        }
    }

    /// Evaluate at time `t`. `None` when the expression needs a filter variable
    /// or an unknown function.
    pub fn eval(&self, t: f64) -> Option<f64> {
        Some(match self {
            Expr::Const(v) => *v,
            Expr::Time => t,
            Expr::Var(_) => return None,
            Expr::Add(a, b) => a.eval(t)? + b.eval(t)?,
            Expr::Sub(a, b) => a.eval(t)? - b.eval(t)?,
            Expr::Mul(a, b) => a.eval(t)? * b.eval(t)?,
            Expr::Div(a, b) => a.eval(t)? / b.eval(t)?,
            Expr::Call(name, args) => {
                let v = args
                    .iter()
                    .map(|a| a.eval(t))
                    .collect::<Option<Vec<f64>>>()?;
                match (*name, v.as_slice()) {
                    ("if", [c, a, b]) => {
                        if *c != 0.0 {
                            *a
                        } else {
                            *b
                        }
                    }
                    ("lt", [a, b]) => bool_num(a < b),
                    ("lte", [a, b]) => bool_num(a <= b),
                    ("gte", [a, b]) => bool_num(a >= b),
                    ("eq", [a, b]) => bool_num(a == b),
                    ("min", [a, b]) => a.min(*b),
                    ("max", [a, b]) => a.max(*b),
                    ("clip", [x, lo, hi]) => x.clamp(*lo, *hi),
                    ("between", [x, lo, hi]) => bool_num(x >= lo && x <= hi),
                    ("abs", [x]) => x.abs(),
                    ("hypot", [a, b]) => a.hypot(*b),
                    _ => return None,
                }
            }
        })
    }

    /// Render with the given time variable spelling.
    pub fn render(&self, time: TimeVar) -> String {
        match self {
            Expr::Const(v) if *v < 0.0 => format!("({})", fmt_num(*v)),
            Expr::Const(v) => fmt_num(*v),
            Expr::Time => time.as_str().to_string(),
            Expr::Var(name) => (*name).to_string(),
            Expr::Add(a, b) => format!("({}+{})", a.render(time), b.render(time)),
            Expr::Sub(a, b) => format!("({}-{})", a.render(time), b.render(time)),
            Expr::Mul(a, b) => format!("{}*{}", a.render(time), b.render(time)),
            Expr::Div(a, b) => format!("{}/{}", a.render(time), wrap_divisor(b, time)),
            Expr::Call(name, args) => format!(
                "{}({})",
                name,
                args.iter()
                    .map(|a| a.render(time))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

fn wrap_divisor(e: &Expr, time: TimeVar) -> String {
    match e {
        Expr::Mul(..) | Expr::Div(..) => format!("({})", e.render(time)),
        _ => e.render(time),
    }
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(TimeVar::Lower))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::Const(a + b),
            (Some(a), None) if a == 0.0 => rhs,
            (None, Some(b)) if b == 0.0 => self,
            _ => Expr::Add(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::Const(a - b),
            (None, Some(b)) if b == 0.0 => self,
            _ => Expr::Sub(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::Const(a * b),
            (Some(a), _) | (_, Some(a)) if a == 0.0 => Expr::Const(0.0),
            (Some(a), None) if a == 1.0 => rhs,
            (None, Some(b)) if b == 1.0 => self,
            _ => Expr::Mul(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) if b != 0.0 => Expr::Const(a / b),
            (None, Some(b)) if b == 1.0 => self,
            _ => Expr::Div(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Const(0.0) - self
    }
}

macro_rules! scalar_rhs {
    ($($tr:ident $method:ident),*) => {$(
        impl $tr<f64> for Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                $tr::$method(self, Expr::Const(rhs))
            }
        }
    )*};
}

scalar_rhs!(Add add, Sub sub, Mul mul, Div div);

/// Format a number compactly: integers without a fraction, others with at
/// most six decimals.
pub fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let rounded = (v * 1e6).round() / 1e6;
    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.6}", rounded);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Escape an option value for use inside `-filter_complex`.
///
/// The option parser treats `\`, `'` and `:` specially; the graph parser
/// additionally splits on `[ ] , ;`. Values are escaped for the first level
/// and single-quoted for the second when needed.
pub fn escape_value(value: &str) -> String {
    let mut opt = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            opt.push('\\');
        }
        opt.push(c);
    }

    let needs_quotes = opt
        .chars()
        .any(|c| matches!(c, '[' | ']' | ',' | ';' | '\'' | '\\') || c.is_whitespace());
    if needs_quotes {
        format!("'{}'", opt.replace('\'', "'\\''"))
    } else {
        opt
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
}

/// One filter with its options.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a positional option.
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Add a `key=value` option.
    pub fn opt(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    /// Add a numeric option.
    pub fn num(self, key: impl Into<String>, value: f64) -> Self {
        self.opt(key, fmt_num(value))
    }

    /// Add an expression option using `t` for time.
    pub fn expr(self, key: impl Into<String>, expr: &Expr) -> Self {
        self.opt(key, expr.render(TimeVar::Lower))
    }

    /// Add an expression option using `T` for time.
    pub fn expr_upper(self, key: impl Into<String>, expr: &Expr) -> Self {
        self.opt(key, expr.render(TimeVar::Upper))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (unescaped) value of a named option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(v) => write!(f, "{}", escape_value(v))?,
                FilterArg::Named(k, v) => write!(f, "{}={}", k, escape_value(v))?,
            }
        }
        Ok(())
    }
}

/// Linear sequence of filters between input and output pads.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        let filters = self
            .filters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&filters)?;
        for pad in &self.outputs {
            write!(f, "{}", pad)?;
        }
        Ok(())
    }
}

/// A complete `-filter_complex` graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
    next_label: usize,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh label.
    pub fn label(&mut self, prefix: &str) -> Pad {
        let pad = Pad::Label(format!("{}{}", prefix, self.next_label));
        self.next_label += 1;
        pad
    }

    /// Append a chain with explicit outputs.
    pub fn push(&mut self, inputs: Vec<Pad>, filters: Vec<Filter>, outputs: Vec<Pad>) {
        self.chains.push(FilterChain {
            inputs,
            filters,
            outputs,
        });
    }

    /// Append a chain with a single fresh output and return that output.
    pub fn chain(&mut self, inputs: Vec<Pad>, filters: Vec<Filter>, prefix: &str) -> Pad {
        let out = self.label(prefix);
        self.push(inputs, filters, vec![out.clone()]);
        out
    }

    /// Append a chain with `n` fresh outputs (`split`, `asplit`).
    pub fn chain_n(&mut self, inputs: Vec<Pad>, filters: Vec<Filter>, prefix: &str, n: usize) -> Vec<Pad> {
        let outs: Vec<Pad> = (0..n).map(|_| self.label(prefix)).collect();
        self.push(inputs, filters, outs.clone());
        outs
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// All filters with the given name, in graph order.
    pub fn filters_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Filter> + 'a {
        self.chains
            .iter()
            .flat_map(|c| c.filters.iter())
            .filter(move |f| f.name() == name)
    }

    /// Labels that are produced but never consumed (excluding `sinks`), or
    /// consumed without being produced.
    pub fn dangling_labels(&self, sinks: &[Pad]) -> Vec<String> {
        let mut produced: Vec<&str> = Vec::new();
        let mut consumed: Vec<&str> = Vec::new();
        for chain in &self.chains {
            for pad in &chain.outputs {
                if let Pad::Label(name) = pad {
                    produced.push(name);
                }
            }
            for pad in &chain.inputs {
                if let Pad::Label(name) = pad {
                    consumed.push(name);
                }
            }
        }
        let sink_names: Vec<&str> = sinks
            .iter()
            .filter_map(|p| match p {
                Pad::Label(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();

        let mut dangling: Vec<String> = produced
            .iter()
            .filter(|p| !consumed.contains(p) && !sink_names.contains(p))
            .map(|p| p.to_string())
            .collect();
        dangling.extend(
            consumed
                .iter()
                .filter(|c| !produced.contains(c))
                .map(|c| c.to_string()),
        );
        dangling
    }

    /// Serialize for `-filter_complex`.
    pub fn to_filter_complex(&self) -> String {
        self.chains
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter_complex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(2.0), "2");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_num(-0.0), "0");
        assert_eq!(fmt_num(f64::NAN), "0");
    }

    #[test]
    fn test_constant_folding() {
        let e = Expr::num(2.0) * Expr::num(3.0) + 1.0;
        assert_eq!(e, Expr::Const(7.0));

        let e = Expr::time() * 1.0 + 0.0;
        assert_eq!(e, Expr::Time);

        assert_eq!(Expr::clip(Expr::num(4.0), 0.0, 1.0), Expr::Const(1.0));
        assert_eq!(
            Expr::if_else(Expr::num(0.0), Expr::num(1.0), Expr::num(2.0)),
            Expr::Const(2.0)
        );
    }

    #[test]
    fn test_ramp_render_and_eval() {
        let ramp = Expr::ramp(Expr::time(), 2.0, 4.0);
        assert_eq!(ramp.render(TimeVar::Lower), "clip((t-2)/4,0,1)");
        assert_eq!(ramp.render(TimeVar::Upper), "clip((T-2)/4,0,1)");
        assert_eq!(ramp.eval(4.0), Some(0.5));
        assert_eq!(ramp.eval(0.0), Some(0.0));
        assert_eq!(ramp.eval(10.0), Some(1.0));
    }

    #[test]
    fn test_negative_constants_are_parenthesized() {
        let e = Expr::time() + Expr::num(-3.0);
        assert_eq!(e.to_string(), "(t+(-3))");
        assert_eq!(e.eval(5.0), Some(2.0));
    }

    #[test]
    fn test_eval_with_filter_variable_is_none() {
        let e = Expr::var("W") * Expr::time();
        assert_eq!(e.eval(1.0), None);
        assert!(e.depends_on_time());
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("black"), "black");
        assert_eq!(escape_value("if(lt(t,1),0,1)"), "'if(lt(t,1),0,1)'");
        assert_eq!(escape_value("Hello world"), "'Hello world'");
        assert_eq!(escape_value("10:30"), "'10\\:30'");
        assert_eq!(escape_value("It's"), "'It\\'\\''s'");
    }

    #[test]
    fn test_filter_display() {
        let f = Filter::new("overlay")
            .num("x", 10.0)
            .expr("y", &(Expr::time() * 2.0))
            .opt("eof_action", "pass");
        assert_eq!(f.to_string(), "overlay=x=10:y=t*2:eof_action=pass");
        assert_eq!(f.get("eof_action"), Some("pass"));

        assert_eq!(Filter::new("null").to_string(), "null");
        assert_eq!(Filter::new("fps").arg(30).to_string(), "fps=30");
    }

    #[test]
    fn test_graph_serialization_and_labels() {
        let mut graph = FilterGraph::new();
        let scaled = graph.chain(
            vec![Pad::video(0)],
            vec![Filter::new("scale").arg(1280).arg(720)],
            "v",
        );
        let out = graph.chain(
            vec![scaled],
            vec![Filter::new("format").arg("yuv420p")],
            "out",
        );

        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]scale=1280:720[v0];[v0]format=yuv420p[out1]"
        );
        assert!(graph.dangling_labels(&[out.clone()]).is_empty());
        assert_eq!(graph.dangling_labels(&[]), vec!["out1".to_string()]);
        assert_eq!(out.map_arg(), "[out1]");
        assert_eq!(Pad::audio(2).map_arg(), "2:a");
    }
}
