//! Streaming handshake and pipeline stages.
//!
//! Samples flow between pipeline stages over links with a valid/ready
//! handshake. On each clock cycle the producer drives `valid` together with a
//! payload and the consumer drives `ready`. A transfer happens when both are
//! asserted.
//!
//! A [`Stage`] has one input link and one output link. Its behaviour during a
//! cycle is described by three functions:
//!
//! - [`Stage::ready`] gives the input `ready` as a function of the stage state
//!   and the output `ready`.
//! - [`Stage::output`] gives the output payload (`None` meaning not valid) as
//!   a function of the stage state and the input payload.
//! - [`Stage::clock`] advances the stage state at the end of the cycle.
//!
//! Since `ready` only depends on what is downstream and `output` only depends
//! on what is upstream, chaining stages can never form a combinational loop.
//! [`Chain`] and [`Pipeline`] evaluate all the `ready` signals from the output
//! towards the input, then all the payloads from the input towards the output,
//! and finally clock every stage.

/// Handshake signals of a link during one clock cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handshake {
    /// The producer drives a payload.
    pub valid: bool,
    /// The consumer accepts a payload.
    pub ready: bool,
}

impl Handshake {
    /// Creates the handshake signals of a link.
    pub fn new(valid: bool, ready: bool) -> Handshake {
        Handshake { valid, ready }
    }

    /// A payload is transferred in this cycle.
    pub fn consume(&self) -> bool {
        self.valid && self.ready
    }

    /// The consumer is not stalling the link.
    ///
    /// A producer can load a new payload into its output when this holds.
    pub fn produce(&self) -> bool {
        self.ready || !self.valid
    }
}

/// Pipeline stage.
pub trait Stage {
    /// Input payload.
    type Input;
    /// Output payload.
    type Output;

    /// Returns the input `ready` given the output `ready`.
    fn ready(&self, output_ready: bool) -> bool;

    /// Returns the output payload given the input payload.
    ///
    /// An input of `None` means that the input is not valid. A return value
    /// of `None` means that the output is not valid.
    fn output(&self, input: Option<&Self::Input>) -> Option<Self::Output>;

    /// Advances the state by one clock cycle.
    ///
    /// The arguments are the same as those given to [`Stage::ready`] and
    /// [`Stage::output`] during this cycle.
    fn clock(&mut self, input: Option<&Self::Input>, output_ready: bool);

    /// Returns `true` if the input is consumed in this cycle.
    fn consumes(&self, input: Option<&Self::Input>, output_ready: bool) -> bool {
        Handshake::new(input.is_some(), self.ready(output_ready)).consume()
    }
}

/// Output register of a stage.
///
/// The register holds the payload driven on the output link. It can be loaded
/// whenever the link is not stalled.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Register<T>(Option<T>);

impl<T> Default for Register<T> {
    fn default() -> Register<T> {
        Register(None)
    }
}

impl<T: Clone> Register<T> {
    /// Creates an empty register.
    pub fn new() -> Register<T> {
        Register(None)
    }

    /// Returns the payload held by the register.
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Returns a copy of the payload held by the register.
    pub fn output(&self) -> Option<T> {
        self.0.clone()
    }

    /// The register holds a valid payload.
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// The register can be loaded in this cycle.
    pub fn produce(&self, output_ready: bool) -> bool {
        Handshake::new(self.is_valid(), output_ready).produce()
    }

    /// Loads the register.
    pub fn load(&mut self, value: Option<T>) {
        self.0 = value;
    }

    /// Empties the register, returning its payload.
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }
}

/// Registered stage applying a function to each sample.
#[derive(Clone)]
pub struct Registered<I, O> {
    function: fn(&I) -> O,
    register: Register<O>,
}

impl<I, O: std::fmt::Debug> std::fmt::Debug for Registered<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("Registered")
            .field("register", &self.register)
            .finish_non_exhaustive()
    }
}

impl<I, O: Clone> Registered<I, O> {
    /// Creates a new registered stage.
    pub fn new(function: fn(&I) -> O) -> Registered<I, O> {
        Registered {
            function,
            register: Register::new(),
        }
    }
}

impl<I, O: Clone> Stage for Registered<I, O> {
    type Input = I;
    type Output = O;

    fn ready(&self, output_ready: bool) -> bool {
        self.register.produce(output_ready)
    }

    fn output(&self, _input: Option<&I>) -> Option<O> {
        self.register.output()
    }

    fn clock(&mut self, input: Option<&I>, output_ready: bool) {
        if self.register.produce(output_ready) {
            self.register.load(input.map(self.function));
        }
    }
}

/// Two stages connected in series.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    /// Connects the output of `first` to the input of `second`.
    pub fn new(first: A, second: B) -> Chain<A, B> {
        Chain { first, second }
    }

    /// Returns the first stage.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Returns the second stage.
    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A, B> Stage for Chain<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn ready(&self, output_ready: bool) -> bool {
        self.first.ready(self.second.ready(output_ready))
    }

    fn output(&self, input: Option<&A::Input>) -> Option<B::Output> {
        self.second.output(self.first.output(input).as_ref())
    }

    fn clock(&mut self, input: Option<&A::Input>, output_ready: bool) {
        let middle_ready = self.second.ready(output_ready);
        let middle = self.first.output(input);
        self.first.clock(input, middle_ready);
        self.second.clock(middle.as_ref(), output_ready);
    }
}

/// Sequence of stages of the same type connected in series.
///
/// An empty pipeline passes its input through.
#[derive(Debug, Clone)]
pub struct Pipeline<S> {
    stages: Vec<S>,
}

impl<S, T> Pipeline<S>
where
    S: Stage<Input = T, Output = T>,
    T: Clone,
{
    /// Creates a pipeline from a list of stages ordered from input to output.
    pub fn new(stages: Vec<S>) -> Pipeline<S> {
        Pipeline { stages }
    }

    /// Returns the stages ordered from input to output.
    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    // Ready signal at the output of each stage, ordered from input to output.
    fn readies(&self, output_ready: bool) -> Vec<bool> {
        let mut readies = vec![output_ready; self.stages.len()];
        let mut ready = output_ready;
        for (stage, stage_ready) in self.stages.iter().zip(readies.iter_mut()).rev() {
            *stage_ready = ready;
            ready = stage.ready(ready);
        }
        readies
    }
}

impl<S, T> Stage for Pipeline<S>
where
    S: Stage<Input = T, Output = T>,
    T: Clone,
{
    type Input = T;
    type Output = T;

    fn ready(&self, output_ready: bool) -> bool {
        self.stages
            .iter()
            .rev()
            .fold(output_ready, |ready, stage| stage.ready(ready))
    }

    fn output(&self, input: Option<&T>) -> Option<T> {
        let mut payload = input.cloned();
        for stage in &self.stages {
            payload = stage.output(payload.as_ref());
        }
        payload
    }

    fn clock(&mut self, input: Option<&T>, output_ready: bool) {
        let readies = self.readies(output_ready);
        let mut inputs = Vec::with_capacity(self.stages.len());
        let mut payload = input.cloned();
        for stage in &self.stages {
            let next = stage.output(payload.as_ref());
            inputs.push(payload);
            payload = next;
        }
        for ((stage, input), ready) in self.stages.iter_mut().zip(&inputs).zip(readies) {
            stage.clock(input.as_ref(), ready);
        }
    }
}

// Implements Stage for an enum whose variants wrap stages with the same
// payload type.
macro_rules! impl_stage_enum {
    ($ty:ident, $payload:ty, $($variant:ident),*) => {
        impl $crate::stream::Stage for $ty {
            type Input = $payload;
            type Output = $payload;

            fn ready(&self, output_ready: bool) -> bool {
                match self {
                    $(
                        $ty::$variant(stage) => {
                            $crate::stream::Stage::ready(stage, output_ready)
                        }
                    )*
                }
            }

            fn output(&self, input: Option<&$payload>) -> Option<$payload> {
                match self {
                    $(
                        $ty::$variant(stage) => $crate::stream::Stage::output(stage, input),
                    )*
                }
            }

            fn clock(&mut self, input: Option<&$payload>, output_ready: bool) {
                match self {
                    $(
                        $ty::$variant(stage) => {
                            $crate::stream::Stage::clock(stage, input, output_ready)
                        }
                    )*
                }
            }
        }
    }
}

pub(crate) use impl_stage_enum;
