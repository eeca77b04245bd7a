//! Control-flow combinators over actions
//!
//! A workflow declares ordering and parallelism once per decision cycle and
//! lets the tree decide which actions to move forward:
//!
//! - [`FlowNode::Sequence`] evaluates children left-to-right and stops at the
//!   first one that is not done.
//! - [`FlowNode::Split`] evaluates every child so independent branches make
//!   progress in the same cycle.
//!
//! Trees are built either directly with [`FlowNode::leaf`],
//! [`FlowNode::sequence`] and [`FlowNode::split`], or with the stack-based
//! [`DecisionBuilder`].

use std::fmt;

use serde_json::{json, Value};
use tracing::debug;

use crate::action::{Action, ActionState};
use crate::decision::Decision;
use crate::error::{DecisionError, Result};
use crate::history::WorkflowHistory;

/// Factory producing the action a leaf evaluates
pub type ActionFn<'a> = Box<dyn FnMut() -> Action + 'a>;

/// A leaf wrapping an action factory
pub struct Leaf<'a> {
    id: String,
    factory: ActionFn<'a>,
}

impl<'a> Leaf<'a> {
    fn new(mut factory: ActionFn<'a>) -> Self {
        let id = factory().id().to_string();
        Self { id, factory }
    }

    /// Id of the action the factory produces
    pub fn action_id(&self) -> &str {
        &self.id
    }
}

/// Node of a control-flow tree
pub enum FlowNode<'a> {
    /// Single action, done once it succeeds
    Leaf(Leaf<'a>),

    /// Children in order, one at a time
    Sequence(Vec<FlowNode<'a>>),

    /// Children in parallel
    Split(Vec<FlowNode<'a>>),
}

impl<'a> FlowNode<'a> {
    /// Wrap an action factory
    pub fn leaf(factory: impl FnMut() -> Action + 'a) -> Self {
        Self::Leaf(Leaf::new(Box::new(factory)))
    }

    /// Run children one after another
    pub fn sequence(children: Vec<FlowNode<'a>>) -> Self {
        Self::Sequence(children)
    }

    /// Run children side by side
    pub fn split(children: Vec<FlowNode<'a>>) -> Self {
        Self::Split(children)
    }

    /// Evaluate the node, appending decisions
    ///
    /// Returns true when every action under the node has succeeded.
    pub fn decide(
        &mut self,
        history: &WorkflowHistory,
        decisions: &mut Vec<Decision>,
    ) -> Result<bool> {
        match self {
            Self::Leaf(leaf) => {
                let mut action = (leaf.factory)();
                let state = action.decide(history, decisions)?.state(history)?;
                Ok(state == ActionState::Success)
            }
            Self::Sequence(children) => {
                for child in children.iter_mut() {
                    if !child.decide(history, decisions)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Split(children) => {
                let mut done = true;
                for child in children.iter_mut() {
                    done &= child.decide(history, decisions)?;
                }
                Ok(done)
            }
        }
    }

    /// Structured rendering for diagnostics
    ///
    /// Leaves render as their action id, composites as a single-key object
    /// (`seq` or `split`) holding their children.
    pub fn describe(&self) -> Value {
        match self {
            Self::Leaf(leaf) => Value::String(leaf.id.clone()),
            Self::Sequence(children) => {
                json!({ "seq": children.iter().map(Self::describe).collect::<Vec<_>>() })
            }
            Self::Split(children) => {
                json!({ "split": children.iter().map(Self::describe).collect::<Vec<_>>() })
            }
        }
    }
}

impl fmt::Display for FlowNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Self::Leaf(leaf) => return write!(f, "'{}'", leaf.id),
            Self::Sequence(children) => ("seq", children),
            Self::Split(children) => ("split", children),
        };
        write!(f, "{}(", name)?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for FlowNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowNode({})", self)
    }
}

/// Argument to [`DecisionBuilder::sequence`] and [`DecisionBuilder::split`]
pub enum FlowArg<'a> {
    /// A leaf action factory
    Action(ActionFn<'a>),

    /// Take the next previously built node off the builder's stack
    Stacked,
}

impl<'a> FlowArg<'a> {
    /// Wrap an action factory
    pub fn action(factory: impl FnMut() -> Action + 'a) -> Self {
        Self::Action(Box::new(factory))
    }
}

/// Stack-based builder for control-flow trees
///
/// Each combinator call builds one node and pushes it. [`FlowArg::Stacked`]
/// arguments pop the most recently built nodes and place them in the order
/// they were built, so nested expressions read naturally:
///
/// ```
/// use everruns_decider::{Action, DecisionBuilder, FlowArg};
///
/// let mut builder = DecisionBuilder::new();
/// builder
///     .split(vec![
///         FlowArg::action(|| Action::activity("a", "A", "1.0")),
///         FlowArg::action(|| Action::activity("b", "B", "1.0")),
///     ])
///     .unwrap()
///     .sequence(vec![
///         FlowArg::Stacked,
///         FlowArg::action(|| Action::activity("c", "C", "1.0")),
///     ])
///     .unwrap();
///
/// assert_eq!(builder.to_string(), "seq(split('a','b'),'c')");
/// ```
#[derive(Default)]
pub struct DecisionBuilder<'a> {
    stack: Vec<FlowNode<'a>>,
}

impl<'a> DecisionBuilder<'a> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Build a sequence node and push it
    pub fn sequence(&mut self, args: Vec<FlowArg<'a>>) -> Result<&mut Self> {
        let children = self.resolve(args)?;
        self.stack.push(FlowNode::Sequence(children));
        Ok(self)
    }

    /// Build a split node and push it
    pub fn split(&mut self, args: Vec<FlowArg<'a>>) -> Result<&mut Self> {
        let children = self.resolve(args)?;
        self.stack.push(FlowNode::Split(children));
        Ok(self)
    }

    /// Push an already built node
    pub fn push(&mut self, node: FlowNode<'a>) -> &mut Self {
        self.stack.push(node);
        self
    }

    fn resolve(&mut self, args: Vec<FlowArg<'a>>) -> Result<Vec<FlowNode<'a>>> {
        let wanted = args
            .iter()
            .filter(|arg| matches!(arg, FlowArg::Stacked))
            .count();
        if wanted > self.stack.len() {
            return Err(DecisionError::UnbalancedFlow(format!(
                "{} stacked arguments but only {} nodes built",
                wanted,
                self.stack.len()
            )));
        }

        // The popped nodes keep the order they were built in
        let mut stacked = self.stack.split_off(self.stack.len() - wanted).into_iter();
        let mut children = Vec::with_capacity(args.len());
        for arg in args {
            let node = match arg {
                FlowArg::Action(factory) => FlowNode::Leaf(Leaf::new(factory)),
                FlowArg::Stacked => match stacked.next() {
                    Some(node) => node,
                    None => {
                        return Err(DecisionError::UnbalancedFlow(
                            "stacked node missing".to_string(),
                        ))
                    }
                },
            };
            children.push(node);
        }
        Ok(children)
    }

    /// Number of nodes on the stack
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Check if nothing has been built yet
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Evaluate every stacked node, top to bottom
    ///
    /// Returns true iff all of them are done.
    pub fn decide(
        &mut self,
        history: &WorkflowHistory,
        decisions: &mut Vec<Decision>,
    ) -> Result<bool> {
        let mut done = true;
        for node in self.stack.iter_mut().rev() {
            done &= node.decide(history, decisions)?;
        }
        debug!(flow = %self, done, decisions = decisions.len(), "flow evaluated");
        Ok(done)
    }

    /// Take the finished tree
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnbalancedFlow`] unless exactly one node remains.
    pub fn build(mut self) -> Result<FlowNode<'a>> {
        match (self.stack.pop(), self.stack.is_empty()) {
            (Some(root), true) => Ok(root),
            (root, _) => Err(DecisionError::UnbalancedFlow(format!(
                "expected one root node, found {}",
                self.stack.len() + usize::from(root.is_some())
            ))),
        }
    }
}

impl fmt::Display for DecisionBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.stack.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}
