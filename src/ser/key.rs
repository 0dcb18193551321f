/// The raw key path of the node being written, kept as a stack so that
/// sibling keys reuse the parent prefix.
///
/// - First key `user` becomes: `user`
/// - Second key `name` becomes: `user[name]` (or `user.name` with dots)
/// - Third key `first` becomes: `user[name][first]`
#[derive(Debug, Default)]
pub struct KeyPath {
    buffer: String,
    ends: Vec<usize>,
    allow_dots: bool,
}

impl KeyPath {
    pub fn new(allow_dots: bool) -> Self {
        Self {
            buffer: String::with_capacity(32),
            ends: Vec::with_capacity(4),
            allow_dots,
        }
    }

    /// Pushes a new segment onto the stack.
    pub fn push_key(&mut self, segment: &str) {
        self.ends.push(self.buffer.len());
        if self.buffer.is_empty() && self.ends.len() == 1 {
            self.buffer.push_str(segment);
        } else if self.allow_dots {
            self.buffer.push('.');
            self.buffer.push_str(segment);
        } else {
            self.buffer.push('[');
            self.buffer.push_str(segment);
            self.buffer.push(']');
        }
    }

    pub fn pop_key(&mut self) {
        if let Some(end) = self.ends.pop() {
            self.buffer.truncate(end);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn brackets() {
        let mut key = KeyPath::new(false);
        key.push_key("user");
        key.push_key("name");
        assert_eq!(key.as_str(), "user[name]");
        key.pop_key();
        key.push_key("age");
        assert_eq!(key.as_str(), "user[age]");
        key.pop_key();
        key.pop_key();
        assert_eq!(key.as_str(), "");
    }

    #[test]
    fn dots() {
        let mut key = KeyPath::new(true);
        key.push_key("a");
        key.push_key("b");
        assert_eq!(key.as_str(), "a.b");
    }

    #[test]
    fn empty_root_segment() {
        let mut key = KeyPath::new(false);
        key.push_key("");
        key.push_key("x");
        assert_eq!(key.as_str(), "[x]");
    }
}
