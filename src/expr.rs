//! Exact symbolic arithmetic over rational functions in named variables.
//!
//! An [`Expr`] is an expanded multivariate polynomial numerator over a list
//! of tracked denominator factors. Every operation returns a canonical
//! value: numerators are kept in expanded sum-of-monomials form and
//! denominator factors are cancelled by exact polynomial division, so
//! structural equality coincides with algebraic equality for every value
//! produced by the analysis.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::error::{AnalysisError, Result};
use crate::symbol::Symbol;

/// A product of symbol powers. The empty monomial is `1`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Monomial {
    powers: BTreeMap<Symbol, u32>,
}

impl Monomial {
    pub fn one() -> Self {
        Monomial::default()
    }

    pub fn symbol(sym: Symbol) -> Self {
        let mut powers = BTreeMap::new();
        powers.insert(sym, 1);
        Monomial { powers }
    }

    pub fn is_one(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut powers = self.powers.clone();
        for (sym, exp) in &other.powers {
            *powers.entry(sym.clone()).or_insert(0) += exp;
        }
        Monomial { powers }
    }

    /// Exact division; `None` when some exponent of `other` exceeds ours.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        let mut powers = self.powers.clone();
        for (sym, exp) in &other.powers {
            match powers.get_mut(sym) {
                Some(have) if *have >= *exp => {
                    *have -= exp;
                    if *have == 0 {
                        powers.remove(sym);
                    }
                }
                _ => return None,
            }
        }
        Some(Monomial { powers })
    }

    pub fn divides(&self, other: &Monomial) -> bool {
        other.div(self).is_some()
    }

    /// Component-wise minimum of exponents.
    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let mut powers = BTreeMap::new();
        for (sym, exp) in &self.powers {
            if let Some(oexp) = other.powers.get(sym) {
                powers.insert(sym.clone(), (*exp).min(*oexp));
            }
        }
        Monomial { powers }
    }

    /// Distinct symbols of the monomial, in name order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.powers.keys().cloned().collect()
    }

    /// Symbol-exponent pairs in name order.
    pub fn powers(&self) -> impl Iterator<Item = (&Symbol, u32)> {
        self.powers.iter().map(|(s, e)| (s, *e))
    }

    pub fn from_powers(powers: impl IntoIterator<Item = (Symbol, u32)>) -> Self {
        Monomial {
            powers: powers.into_iter().filter(|(_, e)| *e > 0).collect(),
        }
    }

    /// Number of multiplicative symbol-power factors (`r**2 * b` has two).
    pub fn factor_count(&self) -> usize {
        self.powers.len()
    }

    pub fn contains(&self, sym: &Symbol) -> bool {
        self.powers.contains_key(sym)
    }

    pub fn total_degree(&self) -> u32 {
        self.powers.values().sum()
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic order on exponent vectors. The order is compatible with
/// multiplication, which exact polynomial division relies on.
impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        let syms: BTreeSet<&Symbol> = self.powers.keys().chain(other.powers.keys()).collect();
        for sym in syms {
            let a = self.powers.get(sym).copied().unwrap_or(0);
            let b = other.powers.get(sym).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_one() {
            return f.write_str("1");
        }
        let mut first = true;
        for (sym, exp) in &self.powers {
            if !first {
                f.write_str("*")?;
            }
            first = false;
            if *exp == 1 {
                write!(f, "{sym}")?;
            } else {
                write!(f, "{sym}**{exp}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// An expanded multivariate polynomial with exact rational coefficients.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, BigRational>,
}

impl Poly {
    pub fn zero() -> Self {
        Poly::default()
    }

    pub fn one() -> Self {
        Poly::constant(BigRational::one())
    }

    pub fn constant(c: BigRational) -> Self {
        let mut terms = BTreeMap::new();
        if !c.is_zero() {
            terms.insert(Monomial::one(), c);
        }
        Poly { terms }
    }

    pub fn symbol(sym: Symbol) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(Monomial::symbol(sym), BigRational::one());
        Poly { terms }
    }

    pub fn from_term(mono: Monomial, coeff: BigRational) -> Self {
        let mut terms = BTreeMap::new();
        if !coeff.is_zero() {
            terms.insert(mono, coeff);
        }
        Poly { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// `Some(c)` when the polynomial is the constant `c` (including zero).
    pub fn as_constant(&self) -> Option<BigRational> {
        match self.terms.len() {
            0 => Some(BigRational::zero()),
            1 => {
                let (mono, coeff) = self.terms.iter().next().unwrap();
                mono.is_one().then(|| coeff.clone())
            }
            _ => None,
        }
    }

    pub fn terms(&self) -> impl DoubleEndedIterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    fn insert_term(&mut self, mono: Monomial, coeff: BigRational) {
        if coeff.is_zero() {
            return;
        }
        match self.terms.get_mut(&mono) {
            Some(c) => {
                *c += coeff;
                if c.is_zero() {
                    self.terms.remove(&mono);
                }
            }
            None => {
                self.terms.insert(mono, coeff);
            }
        }
    }

    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (mono, coeff) in &other.terms {
            out.insert_term(mono.clone(), coeff.clone());
        }
        out
    }

    pub fn neg(&self) -> Poly {
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), -c.clone()))
                .collect(),
        }
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = Poly::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                out.insert_term(m1.mul(m2), c1 * c2);
            }
        }
        out
    }

    pub fn mul_scalar(&self, c: &BigRational) -> Poly {
        if c.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(m, co)| (m.clone(), co * c))
                .collect(),
        }
    }

    pub fn pow(&self, exp: u32) -> Poly {
        let mut out = Poly::one();
        for _ in 0..exp {
            out = out.mul(self);
        }
        out
    }

    fn leading(&self) -> Option<(&Monomial, &BigRational)> {
        self.terms.iter().next_back()
    }

    /// Exact polynomial division; `None` when `self` is not a multiple of
    /// `divisor`.
    pub fn exact_div(&self, divisor: &Poly) -> Option<Poly> {
        if divisor.is_zero() {
            return None;
        }
        if let Some(c) = divisor.as_constant() {
            return Some(self.mul_scalar(&(BigRational::one() / c)));
        }
        let (div_lm, div_lc) = divisor.leading().unwrap();
        let mut rem = self.clone();
        let mut quot = Poly::zero();
        while !rem.is_zero() {
            let (rem_lm, rem_lc) = rem.leading().unwrap();
            let qm = rem_lm.div(div_lm)?;
            let qc = rem_lc / div_lc;
            let qterm = Poly::from_term(qm, qc);
            rem = rem.sub(&qterm.mul(divisor));
            quot = quot.add(&qterm);
        }
        Some(quot)
    }

    /// Greatest monomial dividing every term; `1` for the zero polynomial.
    pub fn monomial_content(&self) -> Monomial {
        let mut iter = self.terms.keys();
        let mut content = match iter.next() {
            Some(m) => m.clone(),
            None => return Monomial::one(),
        };
        for m in iter {
            content = content.gcd(m);
        }
        content
    }

    pub fn div_monomial(&self, mono: &Monomial) -> Option<Poly> {
        let mut terms = BTreeMap::new();
        for (m, c) in &self.terms {
            terms.insert(m.div(mono)?, c.clone());
        }
        Some(Poly { terms })
    }

    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        for mono in self.terms.keys() {
            out.extend(mono.symbols());
        }
        out
    }

    pub fn contains_any(&self, syms: &[Symbol]) -> bool {
        self.terms
            .keys()
            .any(|m| syms.iter().any(|s| m.contains(s)))
    }

    fn leading_coeff_negative(&self) -> bool {
        self.leading().map(|(_, c)| c.is_negative()).unwrap_or(false)
    }
}

impl PartialOrd for Poly {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Poly {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.terms.iter();
        let mut b = other.terms.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some((m1, c1)), Some((m2, c2))) => match m1.cmp(m2).then_with(|| c1.cmp(c2)) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
            }
        }
    }
}

fn fmt_coeff(c: &BigRational) -> String {
    if c.denom().is_one() {
        c.numer().to_string()
    } else {
        format!("{}/{}", c.numer(), c.denom())
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        // Leading term first.
        for (i, (mono, coeff)) in self.terms.iter().rev().enumerate() {
            let mag = coeff.abs();
            if i == 0 {
                if coeff.is_negative() {
                    f.write_str("-")?;
                }
            } else if coeff.is_negative() {
                f.write_str(" - ")?;
            } else {
                f.write_str(" + ")?;
            }
            if mono.is_one() {
                f.write_str(&fmt_coeff(&mag))?;
            } else if mag.is_one() {
                write!(f, "{mono}")?;
            } else {
                write!(f, "{}*{mono}", fmt_coeff(&mag))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// An exact rational function: expanded numerator over tracked denominator
/// factors. Immutable; every operation yields a new canonical value.
#[derive(Clone, Default)]
pub struct Expr {
    num: Poly,
    den: Vec<Poly>,
}

impl Expr {
    pub fn zero() -> Self {
        Expr::default()
    }

    pub fn one() -> Self {
        Expr {
            num: Poly::one(),
            den: Vec::new(),
        }
    }

    pub fn from_int(n: i64) -> Self {
        Expr {
            num: Poly::constant(BigRational::from_integer(BigInt::from(n))),
            den: Vec::new(),
        }
    }

    pub fn from_rational(c: BigRational) -> Self {
        Expr {
            num: Poly::constant(c),
            den: Vec::new(),
        }
    }

    pub fn symbol(name: &str) -> Self {
        Expr {
            num: Poly::symbol(Symbol::new(name)),
            den: Vec::new(),
        }
    }

    pub fn from_symbol(sym: Symbol) -> Self {
        Expr {
            num: Poly::symbol(sym),
            den: Vec::new(),
        }
    }

    pub fn from_monomial(mono: Monomial) -> Self {
        Expr {
            num: Poly::from_term(mono, BigRational::one()),
            den: Vec::new(),
        }
    }

    pub fn from_poly(num: Poly) -> Self {
        Expr::normalized(num, Vec::new())
    }

    fn normalized(mut num: Poly, den: Vec<Poly>) -> Self {
        if num.is_zero() {
            return Expr::zero();
        }
        let mut factors: Vec<Poly> = Vec::new();
        for mut factor in den {
            // Constant factors fold into the numerator.
            if let Some(c) = factor.as_constant() {
                num = num.mul_scalar(&(BigRational::one() / c));
                continue;
            }
            if let Some(quot) = num.exact_div(&factor) {
                num = quot;
                continue;
            }
            if factor.num_terms() == 1 {
                // Single-term factor: cancel shared monomial content and
                // fold the coefficient into the numerator.
                let (mono, coeff) = factor.terms().next().unwrap();
                let (mono, coeff) = (mono.clone(), coeff.clone());
                let common = num.monomial_content().gcd(&mono);
                num = num
                    .div_monomial(&common)
                    .expect("content divides every term")
                    .mul_scalar(&(BigRational::one() / coeff));
                match mono.div(&common) {
                    Some(rest) if rest.is_one() => continue,
                    Some(rest) => factor = Poly::from_term(rest, BigRational::one()),
                    None => unreachable!("gcd divides the factor"),
                }
            } else if factor.leading_coeff_negative() {
                factor = factor.neg();
                num = num.neg();
            }
            factors.push(factor);
        }
        factors.sort();
        Expr {
            num,
            den: factors,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.den.is_empty() && self.num.as_constant().map(|c| c.is_one()).unwrap_or(false)
    }

    /// `Some(c)` when the value is the rational constant `c`.
    pub fn as_constant(&self) -> Option<BigRational> {
        if self.den.is_empty() {
            self.num.as_constant()
        } else {
            None
        }
    }

    /// `Some(sym)` when the value is a bare variable.
    pub fn as_symbol(&self) -> Option<Symbol> {
        if !self.den.is_empty() || self.num.num_terms() != 1 {
            return None;
        }
        let (mono, coeff) = self.num.terms().next().unwrap();
        if !coeff.is_one() {
            return None;
        }
        let syms = mono.symbols();
        (syms.len() == 1 && mono.total_degree() == 1).then(|| syms[0].clone())
    }

    pub fn numerator(&self) -> &Poly {
        &self.num
    }

    /// Denominator factors; empty for polynomial values.
    pub fn den_factors(&self) -> &[Poly] {
        &self.den
    }

    pub fn is_polynomial(&self) -> bool {
        self.den.is_empty()
    }

    fn den_poly(&self) -> Poly {
        let mut out = Poly::one();
        for f in &self.den {
            out = out.mul(f);
        }
        out
    }

    pub fn recip(&self) -> Result<Expr> {
        if self.is_zero() {
            return Err(AnalysisError::DivisionByZero);
        }
        Ok(Expr::normalized(self.den_poly(), vec![self.num.clone()]))
    }

    pub fn pow(&self, exp: i64) -> Result<Expr> {
        if exp < 0 {
            return self.recip()?.pow(-exp);
        }
        let mut out = Expr::one();
        for _ in 0..exp {
            out = &out * self;
        }
        Ok(out)
    }

    /// All symbols occurring in the value, numerator and denominator alike.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut out = self.num.symbols();
        for f in &self.den {
            out.extend(f.symbols());
        }
        out
    }

    pub fn contains_any(&self, syms: &[Symbol]) -> bool {
        self.num.contains_any(syms) || self.den.iter().any(|f| f.contains_any(syms))
    }

    /// Substitutes `value` for every occurrence of `sym`.
    pub fn substitute_symbol(&self, sym: &Symbol, value: &Expr) -> Expr {
        let subst_poly = |poly: &Poly| -> Expr {
            let mut acc = Expr::zero();
            for (mono, coeff) in poly.terms() {
                let mut exp = 0u32;
                let rest = Monomial::from_powers(mono.powers().filter_map(|(s, e)| {
                    if s == sym {
                        exp = e;
                        None
                    } else {
                        Some((s.clone(), e))
                    }
                }));
                let mut term = Expr::from_poly(Poly::from_term(rest, coeff.clone()));
                for _ in 0..exp {
                    term = &term * value;
                }
                acc = &acc + &term;
            }
            acc
        };
        let mut out = subst_poly(&self.num);
        for factor in &self.den {
            let f = subst_poly(factor);
            if !f.is_zero() {
                out = &out / &f;
            }
        }
        out
    }

    /// Replaces every occurrence of the product `var * common` by `var`,
    /// used to rewrite non-lone variables acting as lone ones.
    pub fn replace_product(&self, var: &Symbol, common: &Symbol) -> Expr {
        let common_mono = Monomial::symbol(common.clone());
        let mut out = Poly::zero();
        for (mono, coeff) in self.num.terms() {
            let mut mono = mono.clone();
            while mono.contains(var) && mono.contains(common) {
                mono = mono
                    .div(&common_mono)
                    .expect("checked that the factor is present");
            }
            out = out.add(&Poly::from_term(mono, coeff.clone()));
        }
        Expr::normalized(out, self.den.clone())
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.den == other.den {
            return self.num == other.num;
        }
        self.num.mul(&other.den_poly()) == other.num.mul(&self.den_poly())
    }
}

impl Eq for Expr {}

impl Add for &Expr {
    type Output = Expr;

    fn add(self, other: &Expr) -> Expr {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        // Least common denominator by factor multiset.
        let mut lcm: Vec<Poly> = self.den.clone();
        let mut extra_self: Vec<Poly> = Vec::new();
        let mut remaining = lcm.clone();
        for f in &other.den {
            if let Some(pos) = remaining.iter().position(|g| g == f) {
                remaining.remove(pos);
            } else {
                lcm.push(f.clone());
                extra_self.push(f.clone());
            }
        }
        // `remaining` is what `other` misses from our denominator.
        let mut lhs = self.num.clone();
        for f in extra_self {
            lhs = lhs.mul(&f);
        }
        let mut rhs = other.num.clone();
        for f in remaining {
            rhs = rhs.mul(&f);
        }
        Expr::normalized(lhs.add(&rhs), lcm)
    }
}

impl Sub for &Expr {
    type Output = Expr;

    fn sub(self, other: &Expr) -> Expr {
        self + &(-other)
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr {
            num: self.num.neg(),
            den: self.den.clone(),
        }
    }
}

impl Mul for &Expr {
    type Output = Expr;

    fn mul(self, other: &Expr) -> Expr {
        if self.is_zero() || other.is_zero() {
            return Expr::zero();
        }
        let mut den = self.den.clone();
        den.extend(other.den.iter().cloned());
        Expr::normalized(self.num.mul(&other.num), den)
    }
}

/// Panics when the divisor is zero; call sites test [`Expr::is_zero`]
/// before dividing.
impl Div for &Expr {
    type Output = Expr;

    fn div(self, other: &Expr) -> Expr {
        let recip = other
            .recip()
            .expect("division by zero expression");
        self * &recip
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den.is_empty() {
            return write!(f, "{}", self.num);
        }
        let den_pieces: Vec<String> = self
            .den
            .iter()
            .map(|p| {
                if p.num_terms() > 1 {
                    format!("({p})")
                } else {
                    format!("{p}")
                }
            })
            .collect();
        let den_str = if den_pieces.len() > 1 {
            format!("({})", den_pieces.join("*"))
        } else {
            den_pieces.into_iter().next().unwrap()
        };
        if self.num.num_terms() == 1 {
            let (mono, coeff) = self.num.terms().next().unwrap();
            let mag = coeff.abs();
            let sign = if coeff.is_negative() { "-" } else { "" };
            // Fold a fractional coefficient into the denominator side.
            let num_str = if mono.is_one() {
                fmt_coeff(&BigRational::from_integer(mag.numer().clone()))
            } else if mag.numer().is_one() {
                format!("{mono}")
            } else {
                format!("{}*{mono}", mag.numer())
            };
            if mag.denom().is_one() {
                write!(f, "{sign}{num_str}/{den_str}")
            } else {
                write!(f, "{sign}{num_str}/({}*{den_str})", mag.denom())
            }
        } else {
            write!(f, "({})/{den_str}", self.num)
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Parses the textual expression syntax of the configuration format:
/// `+ - * / ^` (also `**`), parentheses, integer literals and identifiers.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(AnalysisError::ParseError(format!(
            "unexpected trailing input in '{input}'"
        )));
    }
    Ok(expr)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Int(BigInt),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Caret);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse::<BigInt>()
                    .map_err(|e| AnalysisError::ParseError(e.to_string()))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(AnalysisError::ParseError(format!(
                    "unexpected character '{other}' in '{input}'"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut acc = self.parse_product()?;
        while let Some(tok) = self.peek() {
            match tok {
                Token::Plus => {
                    self.pos += 1;
                    let rhs = self.parse_product()?;
                    acc = &acc + &rhs;
                }
                Token::Minus => {
                    self.pos += 1;
                    let rhs = self.parse_product()?;
                    acc = &acc - &rhs;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut acc = self.parse_unary()?;
        while let Some(tok) = self.peek() {
            match tok {
                Token::Star => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    acc = &acc * &rhs;
                }
                Token::Slash => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    if rhs.is_zero() {
                        return Err(AnalysisError::DivisionByZero);
                    }
                    acc = &acc / &rhs;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let mut negate = false;
        while let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            negate = !negate;
        }
        let expr = self.parse_power()?;
        Ok(if negate { -&expr } else { expr })
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            let mut negative = false;
            while let Some(Token::Minus) = self.peek() {
                self.pos += 1;
                negative = !negative;
            }
            match self.next() {
                Some(Token::Int(n)) => {
                    let exp: i64 = n
                        .try_into()
                        .map_err(|_| AnalysisError::ParseError("exponent too large".into()))?;
                    base.pow(if negative { -exp } else { exp })
                }
                _ => Err(AnalysisError::ParseError("expected integer exponent".into())),
            }
        } else {
            Ok(base)
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::symbol(&name)),
            Some(Token::Int(n)) => Ok(Expr::from_rational(BigRational::from_integer(n))),
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(AnalysisError::ParseError("missing closing parenthesis".into())),
                }
            }
            other => Err(AnalysisError::ParseError(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(e("alpha + r*b").to_string(), "alpha + b*r");
        assert_eq!(e("-x2/x1").to_string(), "-x2/x1");
        assert_eq!(e("-1/b2").to_string(), "-1/b2");
        assert_eq!(e("s*b - s*b").to_string(), "0");
        assert_eq!(e("x^2").to_string(), "x**2");
    }

    #[test]
    fn test_denominator_cancellation() {
        let k = e("alpha * (1/(b1+x3)) + x2*b2*(1/(b1+x3))");
        let cleared = &k * &e("b1 + x3");
        assert!(cleared.is_polynomial());
        assert_eq!(cleared, e("alpha + x2*b2"));
    }

    #[test]
    fn test_mul_squared_denominator() {
        let f = e("(alpha_i + r) / b");
        let d2 = &e("b") * &e("b");
        let cleared = &f * &d2;
        assert!(cleared.is_polynomial());
        assert_eq!(cleared, e("b*(alpha_i + r)"));
    }

    #[test]
    fn test_monomial_content_cancel() {
        let q = &e("x2*x3") / &e("x1*x3");
        assert_eq!(q.to_string(), "x2/x1");
    }

    #[test]
    fn test_equality_cross_multiplied() {
        assert_eq!(e("(a + a*b)/b"), e("a/b + a"));
        assert_ne!(e("a/b"), e("a"));
    }

    #[test]
    fn test_exact_div() {
        let f = e("a*a + 2*a*b + b*b");
        let g = e("a + b");
        let q = f.numerator().exact_div(g.numerator()).unwrap();
        assert_eq!(Expr::from_poly(q), e("a + b"));
        assert!(e("a*a + b").numerator().exact_div(g.numerator()).is_none());
    }

    #[test]
    fn test_replace_product() {
        let c = e("s*b + x*b");
        let out = c.replace_product(&Symbol::new("s"), &Symbol::new("b"));
        assert_eq!(out, e("s + x*b"));
    }

    #[test]
    fn test_negative_power_parse() {
        assert_eq!(e("b^-1").to_string(), "1/b");
        assert_eq!(&e("b^-1") * &e("b"), Expr::one());
    }
}
