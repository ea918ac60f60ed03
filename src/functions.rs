//! The fixed catalog of functions a tree node can be bound to.
//!
//! Each entry carries its arity, the operand kinds it accepts, how many literal scalars
//! and colors it needs, and a plain function pointer that computes its color.

use crate::color::Color;
use crate::error::CatalogError;
use crate::noise;
use crate::random;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Smallest divisor (and log input) magnitude.
pub const EPSILON: f64 = 1e-4;

const LACUNARITY: f64 = 6.0;
const GAIN: f64 = 2.0;
const OCTAVES: f64 = 8.0;
const FREQUENCY: f64 = 64.0;

/// How many subtree operands a function consumes. A single operand is always the left one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    None,
    Single,
    Both,
    /// Either operand may or may not be a subtree, both are consumed.
    DontCare,
}

impl Arity {
    pub fn uses(self, slot: Slot) -> bool {
        match (self, slot) {
            (Arity::None, _) => false,
            (Arity::Single, Slot::Left) => true,
            (Arity::Single, Slot::Right) => false,
            (Arity::Both, _) | (Arity::DontCare, _) => true,
        }
    }
}

/// Operand position relative to a parent node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Left,
    Right,
}

impl Slot {
    pub const BOTH: [Slot; 2] = [Slot::Left, Slot::Right];

    pub fn index(self) -> usize {
        match self {
            Slot::Left => 0,
            Slot::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Left => "left",
            Slot::Right => "right",
        }
    }
}

/// Which operand kinds a function accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Accepts {
    /// The pixel coordinate.
    pub variables: bool,
    /// A literal scalar leaf.
    pub scalars: bool,
    /// A literal color leaf.
    pub colors: bool,
    /// Whole function subtrees.
    pub functions: bool,
}

impl Accepts {
    const NOTHING: Accepts = Accepts {
        variables: false,
        scalars: false,
        colors: false,
        functions: false,
    };
    const ANYTHING: Accepts = Accepts {
        variables: true,
        scalars: true,
        colors: true,
        functions: true,
    };
    const VARIABLES_AND_FUNCTIONS: Accepts = Accepts {
        variables: true,
        scalars: false,
        colors: false,
        functions: true,
    };

    pub fn any_leaf(self) -> bool {
        self.variables || self.scalars || self.colors
    }
}

/// Evaluated operands handed to a function. Operands a function does not consume are black.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Operands {
    pub left: Color,
    pub right: Color,
}

impl Operands {
    pub fn both(left: Color, right: Color) -> Self {
        Self { left, right }
    }
}

/// Literals generated once when a node is created: scalars first, then colors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    values: Vec<Color>,
}

impl ParameterSet {
    pub fn new(values: Vec<Color>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Color {
        self.values.get(index).copied().unwrap_or(Color::BLACK)
    }

    pub fn scalar(&self, index: usize) -> f64 {
        self.get(index).r
    }

    pub fn iter(&self) -> impl Iterator<Item = &Color> {
        self.values.iter()
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Color] {
        &mut self.values
    }
}

pub type Evaluate = fn(Operands, &ParameterSet) -> Color;

pub struct Function {
    pub id: FunctionId,
    pub name: &'static str,
    pub arity: Arity,
    pub accepts: Accepts,
    pub scalars: usize,
    pub colors: usize,
    evaluate: Evaluate,
}

impl Function {
    pub fn parameter_count(&self) -> usize {
        self.scalars + self.colors
    }

    pub fn generate_parameters<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterSet {
        let mut values: Vec<Color> = Vec::with_capacity(self.parameter_count());
        for _ in 0..self.scalars {
            values.push(rng.sample(random::Scalar));
        }
        for _ in 0..self.colors {
            values.push(rng.gen());
        }
        ParameterSet::new(values)
    }

    /// Result is folded into `[0, 1]`.
    pub fn call(&self, operands: Operands, parameters: &ParameterSet) -> Color {
        (self.evaluate)(operands, parameters).folded()
    }

    /// Whether the literal at `index` is a color (as opposed to a scalar).
    pub fn is_color_parameter(&self, index: usize) -> bool {
        index >= self.scalars
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("accepts", &self.accepts)
            .field("scalars", &self.scalars)
            .field("colors", &self.colors)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionId {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Round,
    Min,
    Max,
    Abs,
    Log,
    Sin,
    Cos,
    Atan,
    Noise,
    ColorNoise,
    RandomScalar,
    RandomColor,
}

impl FunctionId {
    pub const ALL: [FunctionId; 17] = [
        FunctionId::Add,
        FunctionId::Subtract,
        FunctionId::Multiply,
        FunctionId::Divide,
        FunctionId::Mod,
        FunctionId::Round,
        FunctionId::Min,
        FunctionId::Max,
        FunctionId::Abs,
        FunctionId::Log,
        FunctionId::Sin,
        FunctionId::Cos,
        FunctionId::Atan,
        FunctionId::Noise,
        FunctionId::ColorNoise,
        FunctionId::RandomScalar,
        FunctionId::RandomColor,
    ];

    pub fn function(self) -> &'static Function {
        &FUNCTIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.function().name
    }

    /// Functions whose only content is a literal, nudged rather than replaced by mutation.
    pub fn is_input(self) -> bool {
        matches!(self, FunctionId::RandomScalar | FunctionId::RandomColor)
    }
}

impl TryFrom<usize> for FunctionId {
    type Error = CatalogError;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        FunctionId::ALL
            .get(id)
            .copied()
            .ok_or(CatalogError::UnknownId(id))
    }
}

impl FromStr for FunctionId {
    type Err = CatalogError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        FunctionId::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::UnknownFunction(name.to_owned()))
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks a function up by its raw id.
pub fn lookup(id: usize) -> Result<&'static Function, CatalogError> {
    FunctionId::try_from(id).map(FunctionId::function)
}

/// The subset of functions random generation may choose from.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    enabled: Vec<FunctionId>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            enabled: FunctionId::ALL.to_vec(),
        }
    }
}

impl Catalog {
    pub fn with_disabled<S: AsRef<str>>(disabled: &[S]) -> Result<Self, CatalogError> {
        let mut enabled = FunctionId::ALL.to_vec();
        for name in disabled {
            let id: FunctionId = name.as_ref().parse()?;
            enabled.retain(|&e| e != id);
        }
        if enabled.is_empty() {
            return Err(CatalogError::Empty);
        }
        debug!(
            "catalog enables {} of {} functions",
            enabled.len(),
            FunctionId::ALL.len()
        );
        Ok(Self { enabled })
    }

    pub fn enabled(&self) -> &[FunctionId] {
        &self.enabled
    }

    /// Uniform among enabled functions.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> FunctionId {
        self.enabled[rng.gen_range(0..self.enabled.len())]
    }
}

fn guard(divisor: f64) -> f64 {
    if divisor.abs() < EPSILON {
        if divisor < 0.0 {
            -EPSILON
        } else {
            EPSILON
        }
    } else {
        divisor
    }
}

fn add(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, |a, b| a + b)
}

fn subtract(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, |a, b| a - b)
}

fn multiply(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, |a, b| a * b)
}

fn divide(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, |a, b| a / guard(b))
}

fn modulo(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, |a, b| a.rem_euclid(guard(b)))
}

fn round(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(f64::round)
}

fn min(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, f64::min)
}

fn max(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.zip_with(operands.right, f64::max)
}

fn abs(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(f64::abs)
}

fn log(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(|v| v.abs().max(EPSILON).ln())
}

fn sin(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(f64::sin)
}

fn cos(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(f64::cos)
}

fn atan(operands: Operands, _: &ParameterSet) -> Color {
    operands.left.map(f64::atan)
}

struct Turbulence {
    lacunarity: f64,
    gain: f64,
    octaves: u32,
    x: f64,
    y: f64,
}

impl Turbulence {
    fn new(operands: Operands, parameters: &ParameterSet, separate_scales: bool) -> Self {
        let scale_x = parameters.scalar(3);
        let scale_y = if separate_scales {
            parameters.scalar(4)
        } else {
            scale_x
        };
        Self {
            lacunarity: parameters.scalar(0) * LACUNARITY,
            gain: parameters.scalar(1) * GAIN,
            octaves: (parameters.scalar(2) * OCTAVES).max(2.0) as u32,
            x: operands.left.sum() * scale_x * FREQUENCY,
            y: operands.right.sum() * scale_y * FREQUENCY,
        }
    }

    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        noise::turbulence3(x, y, z, self.lacunarity, self.gain, self.octaves)
    }
}

fn grayscale_noise(operands: Operands, parameters: &ParameterSet) -> Color {
    let t = Turbulence::new(operands, parameters, false);
    let v = t.sample(t.x, t.y, 0.52342);
    Color::new(v, v, v)
}

fn color_noise(operands: Operands, parameters: &ParameterSet) -> Color {
    let t = Turbulence::new(operands, parameters, true);
    Color::new(
        t.sample(t.x, t.y, 0.52342),
        t.sample(t.x, 0.21045, t.y),
        t.sample(0.78423, t.y, t.x),
    )
}

fn literal(_: Operands, parameters: &ParameterSet) -> Color {
    parameters.get(0)
}

const fn binary(id: FunctionId, name: &'static str, evaluate: Evaluate) -> Function {
    Function {
        id,
        name,
        arity: Arity::Both,
        accepts: Accepts::ANYTHING,
        scalars: 0,
        colors: 0,
        evaluate,
    }
}

const fn unary(id: FunctionId, name: &'static str, evaluate: Evaluate) -> Function {
    Function {
        id,
        name,
        arity: Arity::Single,
        accepts: Accepts::VARIABLES_AND_FUNCTIONS,
        scalars: 0,
        colors: 0,
        evaluate,
    }
}

const fn turbulence(id: FunctionId, name: &'static str, evaluate: Evaluate) -> Function {
    Function {
        id,
        name,
        arity: Arity::DontCare,
        accepts: Accepts::VARIABLES_AND_FUNCTIONS,
        scalars: 5,
        colors: 0,
        evaluate,
    }
}

const fn input(id: FunctionId, name: &'static str, scalars: usize, colors: usize) -> Function {
    Function {
        id,
        name,
        arity: Arity::None,
        accepts: Accepts::NOTHING,
        scalars,
        colors,
        evaluate: literal,
    }
}

// Indexed by `FunctionId as usize`.
static FUNCTIONS: [Function; 17] = [
    binary(FunctionId::Add, "add", add),
    binary(FunctionId::Subtract, "subtract", subtract),
    binary(FunctionId::Multiply, "multiply", multiply),
    binary(FunctionId::Divide, "divide", divide),
    binary(FunctionId::Mod, "mod", modulo),
    unary(FunctionId::Round, "round", round),
    binary(FunctionId::Min, "min", min),
    binary(FunctionId::Max, "max", max),
    unary(FunctionId::Abs, "abs", abs),
    Function {
        id: FunctionId::Log,
        name: "log",
        arity: Arity::Single,
        accepts: Accepts::ANYTHING,
        scalars: 0,
        colors: 0,
        evaluate: log,
    },
    unary(FunctionId::Sin, "sin", sin),
    unary(FunctionId::Cos, "cos", cos),
    unary(FunctionId::Atan, "atan", atan),
    turbulence(FunctionId::Noise, "noise", grayscale_noise),
    turbulence(FunctionId::ColorNoise, "color_noise", color_noise),
    input(FunctionId::RandomScalar, "random_scalar", 1, 0),
    input(FunctionId::RandomColor, "random_color", 0, 1),
];
