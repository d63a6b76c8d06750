use std::any::Any;
use std::fmt::Display;
use std::hash::Hasher;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// A type-erased, thread-safe container.
pub(crate) type Dynamic = Arc<dyn Any + Send + Sync>;

/// Atomic reference-counted string type used for identifiers.
pub(crate) type ArcStr = Arc<str>;

/// A 32-byte BLAKE3 hash used as the fingerprint of a task identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for byte in self.0 {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

#[derive(Default)]
pub(crate) struct Blake3Hasher(blake3::Hasher);

impl Blake3Hasher {
    /// Writes a length-prefixed byte string, so that `("ab", "c")` and
    /// `("a", "bc")` never collide.
    pub(crate) fn write_field(&mut self, bytes: &[u8]) {
        self.write(&(bytes.len() as u64).to_le_bytes());
        self.write(bytes);
    }
}

impl From<Blake3Hasher> for Hash32 {
    fn from(value: Blake3Hasher) -> Self {
        let bytes: [u8; 32] = value.0.finalize().into();
        Hash32::from(bytes)
    }
}

impl Hasher for Blake3Hasher {
    fn finish(&self) -> u64 {
        let mut output = [0u8; 8];
        self.0.finalize_xof().fill(&mut output);
        u64::from_le_bytes(output)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }
}

/// The identity of a task instance.
///
/// A `TaskId` is derived from the declared task name and the ordered,
/// rendered values of its parameters. Two ids built from the same name and
/// the same parameter values are always equal, no matter where or when they
/// were created. Node identity in the graph is decided by id equality alone.
///
/// Rendered as `Name(arg1,arg2)#1a2b3c4d`, where the suffix is the leading
/// part of a BLAKE3 digest over the name and arguments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    name: ArcStr,
    args: Arc<[String]>,
    hash: Hash32,
}

impl TaskId {
    pub fn new(name: impl AsRef<str>, params: impl Params) -> Self {
        Self::from_parts(name.as_ref(), params.render())
    }

    fn from_parts(name: &str, args: Vec<String>) -> Self {
        let hash = {
            let mut hasher = Blake3Hasher::default();
            hasher.write_field(name.as_bytes());
            for arg in &args {
                hasher.write_field(arg.as_bytes());
            }
            hasher.into()
        };

        Self {
            name: name.into(),
            args: args.into(),
            hash,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Hex digest of the identity, 64 characters long.
    pub fn hash(&self) -> String {
        self.hash.to_hex()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})#{}", self.name, self.args.join(","), &self.hash()[..8])
    }
}

impl std::fmt::Debug for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskId({self})")
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered parameter values of a task instance.
///
/// Implemented for `()`, for tuples of up to eight [`Display`] values and for
/// `Vec<T>` where `T: Display`. Values take part in the task identity through
/// their `Display` rendering.
pub trait Params {
    fn render(&self) -> Vec<String>;
}

impl Params for () {
    fn render(&self) -> Vec<String> {
        vec![]
    }
}

impl<T: Display> Params for Vec<T> {
    fn render(&self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

macro_rules! impl_params {
    ($($P:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($P: Display),*> Params for ($($P,)*) {
            fn render(&self) -> Vec<String> {
                let ($($P,)*) = self;
                vec![$($P.to_string()),*]
            }
        }
    };
}

impl_params!(A);
impl_params!(A, B);
impl_params!(A, B, C);
impl_params!(A, B, C, D);
impl_params!(A, B, C, D, E);
impl_params!(A, B, C, D, E, F);
impl_params!(A, B, C, D, E, F, G);
impl_params!(A, B, C, D, E, F, G, H);
