//! The executable flow definition built from a [`DefinitionRep`].
pub mod link_expr;
pub mod rep;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use link_expr::{
    LinkExprError, LinkExprManager, LinkExprManagerFactory, RhaiLinkExprManager,
    RhaiLinkExprManagerFactory,
};
pub use rep::{AttributeRep, DefinitionRep, LinkRep, TaskRep};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("flow `{0}` has no root task")]
    MissingRootTask(String),

    #[error("task id `{0}` is declared more than once")]
    DuplicateTask(String),

    #[error("attribute `{0}` is declared more than once")]
    DuplicateAttribute(String),

    #[error("link {from} -> {to} in task `{container}` references unknown task `{missing}`")]
    UnknownLinkTask {
        container: String,
        from: String,
        to: String,
        missing: String,
    },

    #[error("link {from} -> {to} has unknown type {link_type}")]
    UnknownLinkType {
        from: String,
        to: String,
        link_type: i32,
    },

    #[error("expression link {from} -> {to} has no expression")]
    MissingLinkExpression { from: String, to: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Default,
    Expression,
    Label,
    Error,
}

impl TryFrom<i32> for LinkType {
    type Error = i32;

    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            0 => Ok(LinkType::Default),
            1 => Ok(LinkType::Expression),
            2 => Ok(LinkType::Label),
            3 => Ok(LinkType::Error),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: String,
    name: Option<String>,
    type_id: i32,
    activity_ref: Option<String>,
    settings: HashMap<String, Value>,
    children: Vec<String>,
    links: Vec<usize>,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn type_id(&self) -> i32 {
        self.type_id
    }
    pub fn activity_ref(&self) -> Option<&str> {
        self.activity_ref.as_deref()
    }
    pub fn settings(&self) -> &HashMap<String, Value> {
        &self.settings
    }
    /// Ids of the tasks contained by this one.
    pub fn children(&self) -> &[String] {
        &self.children
    }
    /// Ids of the links between this task's children.
    pub fn links(&self) -> &[usize] {
        &self.links
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    id: usize,
    name: Option<String>,
    link_type: LinkType,
    from: String,
    to: String,
    value: Option<String>,
}

impl Link {
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }
    pub fn from(&self) -> &str {
        &self.from
    }
    pub fn to(&self) -> &str {
        &self.to
    }
    /// The expression of an [`LinkType::Expression`] link.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// A validated flow graph. Only usable once a link expression manager is attached.
pub struct FlowDefinition {
    name: String,
    model_id: Option<String>,
    explicit_reply: bool,
    attributes: HashMap<String, Attribute>,
    root_task: String,
    error_handler_task: Option<String>,
    tasks: HashMap<String, Task>,
    links: Vec<Link>,
    link_expr_manager: Option<Arc<dyn LinkExprManager>>,
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("name", &self.name)
            .field("model_id", &self.model_id)
            .field("tasks", &self.tasks.len())
            .field("links", &self.links.len())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

impl FlowDefinition {
    /// Build and structurally validate a definition.
    pub fn new(rep: DefinitionRep) -> Result<Self, DefinitionError> {
        let DefinitionRep {
            name,
            model_id,
            explicit_reply,
            attributes: attr_reps,
            root_task,
            error_handler_task,
        } = rep;

        let root_rep = root_task.ok_or_else(|| DefinitionError::MissingRootTask(name.clone()))?;

        let mut attributes = HashMap::with_capacity(attr_reps.len());
        for a in attr_reps {
            if attributes.contains_key(&a.name) {
                return Err(DefinitionError::DuplicateAttribute(a.name));
            }
            attributes.insert(
                a.name.clone(),
                Attribute {
                    name: a.name,
                    attr_type: a.attr_type,
                    value: a.value,
                },
            );
        }

        let mut def = FlowDefinition {
            name,
            model_id,
            explicit_reply,
            attributes,
            root_task: root_rep.id.clone(),
            error_handler_task: error_handler_task.as_ref().map(|t| t.id.clone()),
            tasks: HashMap::new(),
            links: Vec::new(),
            link_expr_manager: None,
        };

        def.add_task(root_rep)?;
        if let Some(eh) = error_handler_task {
            def.add_task(eh)?;
        }
        Ok(def)
    }

    fn add_task(&mut self, rep: TaskRep) -> Result<(), DefinitionError> {
        if self.tasks.contains_key(&rep.id) {
            return Err(DefinitionError::DuplicateTask(rep.id));
        }
        let TaskRep {
            id,
            type_id,
            name,
            activity_ref,
            settings,
            tasks,
            links,
        } = rep;

        let children: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        // reserve the id before descending so children can't reuse it
        self.tasks.insert(
            id.clone(),
            Task {
                id: id.clone(),
                name,
                type_id,
                activity_ref,
                settings,
                children: children.clone(),
                links: Vec::new(),
            },
        );
        for child in tasks {
            self.add_task(child)?;
        }

        let mut link_ids = Vec::with_capacity(links.len());
        for l in links {
            for end in [&l.from_id, &l.to_id] {
                if !children.contains(end) {
                    return Err(DefinitionError::UnknownLinkTask {
                        container: id.clone(),
                        from: l.from_id.clone(),
                        to: l.to_id.clone(),
                        missing: end.clone(),
                    });
                }
            }
            let link_type =
                LinkType::try_from(l.link_type).map_err(|t| DefinitionError::UnknownLinkType {
                    from: l.from_id.clone(),
                    to: l.to_id.clone(),
                    link_type: t,
                })?;
            if link_type == LinkType::Expression
                && l.value.as_deref().map_or(true, |v| v.trim().is_empty())
            {
                return Err(DefinitionError::MissingLinkExpression {
                    from: l.from_id,
                    to: l.to_id,
                });
            }
            let link_id = self.links.len();
            self.links.push(Link {
                id: link_id,
                name: l.name,
                link_type,
                from: l.from_id,
                to: l.to_id,
                value: l.value,
            });
            link_ids.push(link_id);
        }
        if let Some(task) = self.tasks.get_mut(&id) {
            task.links = link_ids;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
    pub fn explicit_reply(&self) -> bool {
        self.explicit_reply
    }
    pub fn attributes(&self) -> &HashMap<String, Attribute> {
        &self.attributes
    }
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
    pub fn root_task(&self) -> &Task {
        &self.tasks[&self.root_task]
    }
    pub fn error_handler_task(&self) -> Option<&Task> {
        self.error_handler_task.as_ref().and_then(|id| self.tasks.get(id))
    }
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
    pub fn get_link(&self, id: usize) -> Option<&Link> {
        self.links.get(id)
    }
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn set_link_expr_manager(&mut self, manager: Arc<dyn LinkExprManager>) {
        self.link_expr_manager = Some(manager);
    }
    pub fn link_expr_manager(&self) -> Option<Arc<dyn LinkExprManager>> {
        self.link_expr_manager.clone()
    }
    /// True once an expression manager has been wired in.
    pub fn is_materialized(&self) -> bool {
        self.link_expr_manager.is_some()
    }
}
