use std::{any::Any, collections::HashMap, sync::Arc};

use crate::{
    error::Error,
    request::{Method, Request},
};

/// A node in a traversal tree.
///
/// Use case: `/user/1234/post/5678`. The `user` node resolves `1234` to a
/// child carrying the user, that child resolves `post`, and so on. Nodes
/// expose their payload for hierarchical lookup instead of setting
/// attributes on each other.
pub trait Resource: Send + Sync {
    /// Resolve one path segment to a child. A miss is a 404.
    fn child(&self, name: &str, request: &Request<String>) -> Result<Box<dyn Resource>, Error>;

    /// The value this node contributes to hierarchical lookup, if any.
    fn payload(&self) -> Option<&(dyn Any + Send + Sync)> {
        None
    }
}

/// The explicit record of a traversal, root first.
pub struct ResourcePath {
    nodes: Vec<(String, Box<dyn Resource>)>,
}

impl std::fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|(name, _)| name))
            .finish()
    }
}

impl ResourcePath {
    pub fn traverse<S: AsRef<str>>(
        root: Box<dyn Resource>,
        segments: &[S],
        request: &Request<String>,
    ) -> Result<Self, Error> {
        let mut nodes = vec![(String::new(), root)];
        for segment in segments {
            let segment = segment.as_ref();
            // nodes is never empty: the root is pushed above.
            let child = nodes.last().unwrap().1.child(segment, request)?;
            nodes.push((segment.to_owned(), child));
        }
        Ok(Self { nodes })
    }

    pub fn leaf(&self) -> &dyn Resource {
        self.nodes.last().unwrap().1.as_ref()
    }

    pub fn leaf_name(&self) -> &str {
        &self.nodes.last().unwrap().0
    }

    /// Hierarchical ("smart") lookup: the nearest payload of type `T`,
    /// leaf first, then each ancestor up to the root.
    pub fn find<T: 'static>(&self) -> Option<&T> {
        self.nodes
            .iter()
            .rev()
            .find_map(|(_, node)| node.payload().and_then(|payload| payload.downcast_ref()))
    }
}

type ChildFactory = Box<dyn Fn() -> Box<dyn Resource> + Send + Sync>;

/// Static name-to-child mapping, optionally carrying a payload.
#[derive(Default)]
pub struct StaticResource {
    children: HashMap<&'static str, ChildFactory>,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

impl StaticResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_factory<F>(mut self, name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Resource> + Send + Sync + 'static,
    {
        self.children.insert(name, Box::new(factory));
        self
    }

    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }
}

impl Resource for StaticResource {
    fn child(&self, name: &str, _request: &Request<String>) -> Result<Box<dyn Resource>, Error> {
        self.children
            .get(name)
            .map(|factory| factory())
            .ok_or_else(Error::not_found)
    }

    fn payload(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.payload.as_deref()
    }
}

/// Model lookup kept behind a trait so the storage layer stays external.
pub trait ModelLoader: Send + Sync {
    type Model: Send + Sync + 'static;

    fn get(&self, id: &str) -> Option<Self::Model>;

    /// Override to let a PUT create the model it addresses.
    fn create(&self, _id: &str) -> Option<Self::Model> {
        None
    }
}

/// Resource wrapping a model resolved by id during traversal.
///
/// Unresolved, it resolves a segment through its loader (falling back to
/// `create` on PUT). Once resolved it refuses further traversal and
/// contributes the model as its payload.
pub struct ModelResource<L: ModelLoader> {
    loader: Arc<L>,
    model: Option<L::Model>,
}

impl<L: ModelLoader> ModelResource<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            model: None,
        }
    }

    pub fn model(&self) -> Option<&L::Model> {
        self.model.as_ref()
    }
}

impl<L: ModelLoader + 'static> Resource for ModelResource<L> {
    fn child(&self, name: &str, request: &Request<String>) -> Result<Box<dyn Resource>, Error> {
        if self.model.is_some() {
            return Err(Error::not_found());
        }

        let model = match self.loader.get(name) {
            Some(model) => Some(model),
            None if request.method() == Method::PUT => self.loader.create(name),
            None => None,
        };
        match model {
            Some(model) => Ok(Box::new(ModelResource {
                loader: self.loader.clone(),
                model: Some(model),
            })),
            None => Err(Error::not_found()),
        }
    }

    fn payload(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.model
            .as_ref()
            .map(|model| model as &(dyn Any + Send + Sync))
    }
}
