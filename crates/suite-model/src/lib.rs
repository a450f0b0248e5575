pub mod app;
pub mod datum;
pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod options;
pub mod schedule;
pub mod stack;
pub mod suite;

pub use app::{
    App, AutoSelect, AutoSelectMode, CaseDetails, CaseList, CaseListForm, CaseListFormWorkflow,
    CaseLoadAction, CaseOpenAction, CustomAssertion, CustomInstance, DefaultSearchProperty,
    DetailColumn, FixtureSelect, Form, FormActions, FormKind, FormLink, FormLinkDatum,
    FormRequires, FormType, LoadCaseFromFixture, Module, ModuleKind, ModuleType, OpenCaseAction,
    ParentSelect, PostFormWorkflow, RegistryWorkflow, Relationship, ReportConfig,
    ResourceOverride, SearchConfig, SearchProperty, SortProperty, SubcaseAction,
};
pub use datum::{Assertion, Datum, DatumKind, QueryData, QueryPrompt, QuerySpec, SessionPlan};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticReport, Severity};
pub use error::{CompileError, CycleKind, ModelError, Result, ScheduleError};
pub use ids::{BuildVersion, CaseType, FormId, ModuleId, USERCASE_TYPE};
pub use options::{CompileOptions, Feature, FeatureFlags};
pub use schedule::{FormCondition, FormSchedule, SchedulePhase, ScheduleVisit};
pub use stack::{FrameKind, StackFrame, StackOp, StackQuery};
pub use suite::{
    Command, Endpoint, EndpointArgument, Entry, FixtureVisit, Instance, Menu, MenuCommand,
    RemotePost, RemoteRequest, ScheduleFixture, Suite, XformResource,
};
