//! Instructions sent with each extraction call

pub const IMAGE_TEXT_PROMPT: &str = r#"Extract ALL text from this payment-related document (check, bill, invoice, receipt, or any paper that needs to be paid).

Focus on extracting every piece of text visible including:
- Payee/company names
- Account numbers
- Amounts and totals
- Dates (due dates, issue dates)
- Reference numbers (bill numbers, invoice numbers)
- Customer IDs
- Addresses
- Payment titles/descriptions
- All labels and field names
- Any other text visible

Return ALL text exactly as it appears in the document. Don't summarize, don't skip anything - extract everything."#;

pub const BILL_PARSER_PROMPT: &str = r#"You are an expert at parsing bill and invoice text to extract payment information.

Extract the following information:
1. Receiver: The company or person who should receive the payment
2. Address: The address of the receiver (null if not present)
3. Title: The payment reference/title that should be used (often includes bill number or customer ID)
4. Amount: The total amount to pay (numeric value only, no currency symbols)
5. Bank Account: The bank account number exactly as printed, including spaces
6. Schedule: When the payment should be sent
   - If there's a due date, use that date in YYYY-MM-DD format
   - If the bill says "pay immediately" (e.g. "NATYCHMIAST") or similar, use "immediate"
   - If no due date is specified, use "immediate"

Be precise and copy exact values from the text. Do not leave out any field you can read."#;

pub const TRANSFER_PROMPT: &str = "You are an expert at extracting bank transfer information from Polish or English text. \
Extract the receiver name, the receiver address (null if not mentioned), the transfer title, \
the amount as a plain number, and the bank account number exactly as given.";

pub const BILL_PARSER_USER_PREFIX: &str = "Parse this bill text and extract payment information:\n\n";
