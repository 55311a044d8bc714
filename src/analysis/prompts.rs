const CLAUSE_SEGMENTATION: &str =
    "You are a contract analyst. Split the provided text into individual clauses with headings and line ranges.";
const RISK_SCORING: &str =
    "Assign a risk level of High, Medium, or Low for each clause with justification.";
const RECOMMENDATION: &str =
    "Provide actionable recommendations or redlines for each clause.";
const SUMMARY: &str =
    "Summarize the contract, list critical blockers, and provide an executive overview.";
const OVERLAY: &str =
    "Return bounding boxes for clause references so the frontend can highlight text on a PDF.";
const RESPONSE_SHAPE: &str = "Respond with a single JSON object of the form \
    {\"summary\": string, \"overallRisk\": \"High\"|\"Medium\"|\"Low\", \
    \"clauses\": [{\"title\": string, \"risk\": \"High\"|\"Medium\"|\"Low\", \"explanation\": string, \
    \"recommendation\": string, \"page\": number, \
    \"bounds\": [{\"x\": number, \"y\": number, \"width\": number, \"height\": number}]}], \
    \"overlays\": [same shape as clauses]}.";

/// Fixed system prompt for contract analysis.
pub fn system_prompt() -> String {
    [
        CLAUSE_SEGMENTATION,
        RISK_SCORING,
        RECOMMENDATION,
        SUMMARY,
        OVERLAY,
        RESPONSE_SHAPE,
    ]
    .join("\n\n")
}
