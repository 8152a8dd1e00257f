/// A compact trie over byte strings, used to resolve the longest punctuation token
/// matching at the current lexer position without building one large alternation regex.
#[derive(Debug, Clone)]
pub(crate) struct FieldTree<T> {
    token: Option<T>,
    children: Vec<(u8, FieldTree<T>)>,
}

impl<T> FieldTree<T> {
    pub fn new() -> Self {
        Self {
            token: None,
            children: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: &[u8], token: T) -> Result<(), T> {
        if !value.is_empty() {
            match self
                .children
                .binary_search_by_key(&value[0], |child| child.0)
            {
                Ok(index) => self.children[index].1.insert(&value[1..], token),
                Err(index) => {
                    let mut field = FieldTree::new();
                    field.insert(&value[1..], token)?;
                    self.children.insert(index, (value[0], field));
                    Ok(())
                }
            }
        } else {
            match self.token.replace(token) {
                Some(t) => Err(t),
                None => Ok(()),
            }
        }
    }
}

impl<T: Clone> FieldTree<T> {
    /// Find the longest punctuation match starting at `code_part`, returning the
    /// matched token and the number of bytes it consumed.
    pub fn find(&self, code_part: &[u8]) -> Option<(T, usize)> {
        let mut current_field = self;
        let mut index = 0;

        loop {
            if code_part.len() > index {
                match current_field
                    .children
                    .binary_search_by_key(&code_part[index], |s| s.0)
                {
                    Ok(i) => {
                        index += 1;
                        current_field = &current_field.children[i].1;
                    }
                    Err(_) => {
                        break current_field.token.as_ref().map(|t| (t.clone(), index));
                    }
                }
            } else {
                break current_field.token.as_ref().map(|t| (t.clone(), index));
            }
        }
    }
}
