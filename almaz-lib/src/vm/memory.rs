use crate::vm::*;

/// The activation record of a running procedure: its operand stack and its local slots
#[derive(Debug, Default)]
pub struct Memory {
    pub stack: Vec<Value>,
    pub locals: Vec<Option<Value>>,
    max_stack: usize,
}

impl Memory {
    /// creates memory sized by the procedure header
    pub fn new(max_stack: usize, max_locals: usize) -> Self {
        Self {
            stack: Vec::with_capacity(max_stack),
            locals: vec![None; max_locals],
            max_stack,
        }
    }

    /// puts something on the stack
    pub fn push_stack<T>(&mut self, entry: T) -> Result<()>
    where
        T: Into<Value>,
    {
        if self.stack.len() >= self.max_stack {
            bail!(StackOverflow(self.max_stack));
        }
        self.stack.push(entry.into());
        Ok(())
    }

    pub fn pop_stack(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::StackEmpty("pop from an empty operand stack".into()))
    }

    /// pushes a copy of a local
    pub fn load_local(&mut self, slot: u16) -> Result<()> {
        let val = match self.locals.get(slot as usize) {
            Some(Some(v)) => v.clone(),
            Some(None) => bail!(UninitializedLocal(slot)),
            None => bail!(NoSuchLocal(slot)),
        };
        self.push_stack(val)
    }

    /// pops the stack top into a local
    pub fn store_local(&mut self, slot: u16) -> Result<()> {
        let val = self.pop_stack()?;
        let Some(target) = self.locals.get_mut(slot as usize) else {
            bail!(NoSuchLocal(slot));
        };
        *target = Some(val);
        Ok(())
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locals_roundtrip_through_stack() {
        let mut mem = Memory::new(2, 1);
        mem.push_stack(5i64).unwrap();
        mem.store_local(0).unwrap();
        assert!(mem.stack.is_empty());
        mem.load_local(0).unwrap();
        mem.load_local(0).unwrap();
        assert_eq!(mem.stack, vec![Value::Int(5), Value::Int(5)]);
    }

    #[test]
    fn test_limits_are_enforced() {
        let mut mem = Memory::new(1, 1);
        assert!(matches!(mem.load_local(0), Err(Error::UninitializedLocal(0))));
        assert!(matches!(mem.load_local(3), Err(Error::NoSuchLocal(3))));
        mem.push_stack(String::from("a")).unwrap();
        assert!(matches!(mem.push_stack(1i64), Err(Error::StackOverflow(1))));
        mem.pop_stack().unwrap();
        assert!(matches!(mem.pop_stack(), Err(Error::StackEmpty(_))));
    }
}
