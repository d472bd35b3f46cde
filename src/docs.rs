use crate::api::asset::{AssetListResponse, AssignAsset, CreateAsset};
use crate::api::attendance::{CorrectAttendance, Timesheet, TimesheetQuery};
use crate::api::challenge::{
    AnswerRequest, ChallengeAttempt, CreateChallenge, LeaderboardRow,
};
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::evaluation::CreateEvaluation;
use crate::api::evening_schedule::CreateSchedule;
use crate::api::leave_request::{LeaveFilter, LeaveListResponse};
use crate::api::live_match::MoveRequest;
use crate::api::message::{MessageListResponse, SendMessage};
use crate::api::news::CreateNews;
use crate::api::notification::{DispatchRequest, Subscribe, SubscriptionKeys, Unsubscribe};
use crate::auth::handlers::TokenPair;
use crate::domain::attendance_window::{AttendanceSettings, TimesheetSummary};
use crate::domain::leave_rules::{CreateLeave, LeaveType};
use crate::model::{
    asset::Asset, attendance::Attendance, employee::Employee, evaluation::Evaluation,
    evening_schedule::EveningSchedule, leave_request::LeaveRequest, live_match::LiveMatch,
    message::Message, news::NewsPost,
};
use crate::models::LoginReqDto;
use crate::notify::push::{FanOutReport, PushMessage, PushTarget};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medical Center HR Portal API",
        version = "1.0.0",
        description = r#"
## Medical Center HR Portal

Back office for a medical center's staff: records, attendance, leave,
evaluations, internal messaging, news, assets, evening shifts, training games
and printable forms.

### 🔹 Key Features
- **Employees**: staff records and leave balances
- **Attendance**: check-in/out classified against the day or evening shift, monthly timesheets
- **Leave**: requests with Arabic or English type names, approval deducts the balance
- **Evaluations**: five criteria scored 0-20, graded from the total
- **Messages & News**: internal mail, broadcasts and announcements with push notifications
- **Assets**: inventory and hand-over to staff
- **Training**: daily timed quiz and live tic-tac-toe matches
- **Reports**: printable RTL timesheets, leave forms and QR staff badges

### 🔐 Security
Log in with employee code and national ID at `/auth/login`, then send
`Authorization: Bearer <access_token>`. HR and Admin roles unlock management
endpoints.

### 📡 Live updates
`GET /api/events` streams row changes as Server-Sent Events.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::timesheet,
        crate::api::attendance::correct_attendance,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::evaluation::create_evaluation,
        crate::api::evaluation::list_evaluations,
        crate::api::evaluation::get_evaluation,
        crate::api::evaluation::delete_evaluation,

        crate::api::message::send_message,
        crate::api::message::inbox,
        crate::api::message::sent,
        crate::api::message::unread_count,
        crate::api::message::mark_read,
        crate::api::message::delete_message,

        crate::api::news::create_news,
        crate::api::news::list_news,
        crate::api::news::update_news,
        crate::api::news::delete_news,

        crate::api::asset::create_asset,
        crate::api::asset::list_assets,
        crate::api::asset::get_asset,
        crate::api::asset::update_asset,
        crate::api::asset::assign_asset,
        crate::api::asset::return_asset,
        crate::api::asset::delete_asset,

        crate::api::evening_schedule::create_schedule,
        crate::api::evening_schedule::list_schedules,
        crate::api::evening_schedule::delete_schedule,

        crate::api::live_match::create_match,
        crate::api::live_match::join_match,
        crate::api::live_match::make_move,
        crate::api::live_match::forfeit_match,
        crate::api::live_match::get_match,
        crate::api::live_match::open_matches,
        crate::api::live_match::my_matches,

        crate::api::challenge::create_challenge,
        crate::api::challenge::start_today,
        crate::api::challenge::answer_today,
        crate::api::challenge::leaderboard,

        crate::api::notification::subscribe,
        crate::api::notification::unsubscribe,
        crate::api::notification::dispatch,

        crate::api::setting::get_settings,
        crate::api::setting::update_settings,

        crate::api::report::timesheet_report,
        crate::api::report::leave_report,
        crate::api::report::badge_report,

        crate::api::events::events
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            Employee,
            CreateEmployee,
            EmployeeListResponse,
            Attendance,
            AttendanceSettings,
            CorrectAttendance,
            Timesheet,
            TimesheetQuery,
            TimesheetSummary,
            LeaveType,
            CreateLeave,
            LeaveRequest,
            LeaveFilter,
            LeaveListResponse,
            CreateEvaluation,
            Evaluation,
            SendMessage,
            Message,
            MessageListResponse,
            CreateNews,
            NewsPost,
            CreateAsset,
            AssignAsset,
            Asset,
            AssetListResponse,
            CreateSchedule,
            EveningSchedule,
            LiveMatch,
            MoveRequest,
            CreateChallenge,
            AnswerRequest,
            ChallengeAttempt,
            LeaderboardRow,
            Subscribe,
            SubscriptionKeys,
            Unsubscribe,
            DispatchRequest,
            PushTarget,
            PushMessage,
            FanOutReport
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Employee", description = "Staff records"),
        (name = "Attendance", description = "Check-in, check-out and timesheets"),
        (name = "Leave", description = "Leave requests and approvals"),
        (name = "Evaluation", description = "Monthly staff evaluations"),
        (name = "Message", description = "Internal messaging"),
        (name = "News", description = "Announcements"),
        (name = "Asset", description = "Asset inventory"),
        (name = "EveningSchedule", description = "Evening shift roster"),
        (name = "LiveMatch", description = "Live tic-tac-toe matches"),
        (name = "Challenge", description = "Daily timed quiz"),
        (name = "Notification", description = "Push subscriptions and dispatch"),
        (name = "Settings", description = "General settings"),
        (name = "Report", description = "Printable pages and badges"),
        (name = "Events", description = "Server-Sent Events change feed"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by `security(...)` on each path.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
