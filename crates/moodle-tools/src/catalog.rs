//! Declarative catalog entries.

use moodle_gateway::{ParamDefault, ParamSpec, ToolSpec};

pub const SITE_INFO: ToolSpec = ToolSpec {
    name: "moodle_get_site_info",
    description: "Site name, release and the identity behind the active token.",
    function: "core_webservice_get_site_info",
    mutating: false,
    scope_param: None,
    title: "Site Information",
    pagination: false,
    collection_key: None,
    params: &[],
};

pub const ENROLLED_USERS: ToolSpec = ToolSpec {
    name: "moodle_get_enrolled_users",
    description: "Participants of a course. Supports offset/limit.",
    function: "core_enrol_get_enrolled_users",
    mutating: false,
    scope_param: None,
    title: "Enrolled Users",
    pagination: true,
    collection_key: None,
    params: &[ParamSpec::required("course_id", "courseid", "Course id")],
};

pub const COURSE_GROUPS: ToolSpec = ToolSpec {
    name: "moodle_get_course_groups",
    description: "Groups defined in a course. Supports offset/limit.",
    function: "core_group_get_course_groups",
    mutating: false,
    scope_param: None,
    title: "Course Groups",
    pagination: true,
    collection_key: None,
    params: &[ParamSpec::required("course_id", "courseid", "Course id")],
};

pub const CONVERSATIONS: ToolSpec = ToolSpec {
    name: "moodle_get_conversations",
    description: "Message conversations of a user, newest first. Supports offset/limit.",
    function: "core_message_get_conversations",
    mutating: false,
    scope_param: None,
    title: "Conversations",
    pagination: true,
    collection_key: Some("conversations"),
    params: &[ParamSpec::required("user_id", "userid", "User id")],
};

pub const USER_BADGES: ToolSpec = ToolSpec {
    name: "moodle_get_user_badges",
    description: "Badges awarded to a user, optionally within one course. Supports offset/limit.",
    function: "core_badges_get_user_badges",
    mutating: false,
    scope_param: None,
    title: "User Badges",
    pagination: true,
    collection_key: Some("badges"),
    params: &[
        ParamSpec::optional("user_id", "userid", "User id; defaults to the token owner"),
        ParamSpec::optional("course_id", "courseid", "Restrict to one course"),
    ],
};

pub const FORUM_DISCUSSIONS: ToolSpec = ToolSpec {
    name: "moodle_get_forum_discussions",
    description: "Discussions of one forum. Supports offset/limit.",
    function: "mod_forum_get_forum_discussions",
    mutating: false,
    scope_param: None,
    title: "Forum Discussions",
    pagination: true,
    collection_key: Some("discussions"),
    params: &[ParamSpec::required("forum_id", "forumid", "Forum id")],
};

pub const CREATE_GROUP: ToolSpec = ToolSpec {
    name: "moodle_create_group",
    description: "Create a group in a course. WRITE: only allowed on whitelisted courses.",
    function: "core_group_create_groups",
    mutating: true,
    scope_param: Some("groups.0.courseid"),
    title: "Group Created",
    pagination: false,
    collection_key: None,
    params: &[
        ParamSpec::required("course_id", "groups.0.courseid", "Course id (must be whitelisted)"),
        ParamSpec::required("name", "groups.0.name", "Group name"),
        ParamSpec::optional("description", "groups.0.description", "Group description"),
    ],
};

pub const ENROL_USER: ToolSpec = ToolSpec {
    name: "moodle_enrol_user",
    description: "Manually enrol a user in a course. WRITE: only allowed on whitelisted courses.",
    function: "enrol_manual_enrol_users",
    mutating: true,
    scope_param: Some("enrolments.0.courseid"),
    title: "User Enrolled",
    pagination: false,
    collection_key: None,
    params: &[
        ParamSpec::required("course_id", "enrolments.0.courseid", "Course id (must be whitelisted)"),
        ParamSpec::required("user_id", "enrolments.0.userid", "User to enrol"),
        ParamSpec::optional("role_id", "enrolments.0.roleid", "Role id (5 = student, 3 = teacher)")
            .with_default(ParamDefault::Int(5)),
    ],
};

pub const UPDATE_GRADE: ToolSpec = ToolSpec {
    name: "moodle_update_grade",
    description: "Set one user's grade for an activity. WRITE: only allowed on whitelisted courses.",
    function: "core_grades_update_grades",
    mutating: true,
    scope_param: Some("courseid"),
    title: "Grade Updated",
    pagination: false,
    collection_key: None,
    params: &[
        ParamSpec::required("course_id", "courseid", "Course id (must be whitelisted)"),
        ParamSpec::required("activity_id", "activityid", "Course module id of the activity"),
        ParamSpec::required("user_id", "grades.0.studentid", "Student id"),
        ParamSpec::required("grade", "grades.0.grade", "Grade value"),
        ParamSpec::optional("component", "component", "Activity component")
            .with_default(ParamDefault::Text("mod_assign")),
        ParamSpec::optional("item_number", "itemnumber", "Grade item number")
            .with_default(ParamDefault::Int(0)),
        ParamSpec::optional("source", "source", "Source tag")
            .with_default(ParamDefault::Text("moodle_gateway")),
    ],
};

/// Every purely declarative entry.
pub const DECLARATIVE: &[ToolSpec] = &[
    SITE_INFO,
    ENROLLED_USERS,
    COURSE_GROUPS,
    CONVERSATIONS,
    USER_BADGES,
    FORUM_DISCUSSIONS,
    CREATE_GROUP,
    ENROL_USER,
    UPDATE_GRADE,
];
