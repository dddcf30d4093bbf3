/// Result of a rewriting step: `Yes` carries a rebuilt node, `No` hands back the original.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Transformed::Yes(value) | Transformed::No(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transformed<U> {
        match self {
            Transformed::Yes(value) => Transformed::Yes(f(value)),
            Transformed::No(value) => Transformed::No(f(value)),
        }
    }
}
